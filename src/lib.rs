//! loopback-oidc - OpenID Connect sign-in for native clients
//!
//! Signs a human user in with the Authorization Code flow and PKCE. The
//! browser redirect lands on a transient HTTP listener bound to the loopback
//! interface, so no client secret has to be embedded insecurely.
//!
//! # Architecture
//!
//! - `auth`: the login flow and its building blocks
//! - `config`: configuration for the command-line tool
//! - `cli`: command-line interface definition
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use loopback_oidc::LoginConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoginConfig::new("https://id.example.com", "desktop-app");
//!     let (claims, tokens) = loopback_oidc::login(config).await?;
//!     println!("{} ({:?})", claims.sub, claims.name);
//!     drop(tokens);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use auth::flow::login;
pub use auth::{
    BrowserLauncher, FlowTimeouts, IdentityClaims, LoginConfig, LoginFlow, LoginStage,
    SystemBrowser, TokenSet,
};
pub use config::Config;
pub use error::{FailureKind, LoginError, Result};
