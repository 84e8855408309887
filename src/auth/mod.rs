//! OpenID Connect sign-in for native clients
//!
//! The authorization code flow with PKCE, receiving the browser redirect on
//! a short-lived listener bound to `127.0.0.1`.
//!
//! - `pkce`: verifier/challenge generation
//! - `state`: per-attempt `state` and `nonce`
//! - `discovery`: provider metadata
//! - `callback`: the loopback redirect listener
//! - `token`: token endpoint responses
//! - `id_token`: identity token claim checks
//! - `userinfo`: the signed-in user's claims
//! - `flow`: the orchestrator tying these together

pub mod browser;
pub mod callback;
pub mod config;
pub mod discovery;
pub mod flow;
pub mod id_token;
pub mod pkce;
pub mod state;
pub mod token;
pub mod userinfo;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use config::{FlowTimeouts, LoginConfig};
pub use flow::{LoginFlow, LoginStage};
pub use token::TokenSet;
pub use userinfo::IdentityClaims;
