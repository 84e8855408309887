//! loopback-oidc - sign in to an OpenID Connect provider from the terminal
//!
//! Main entry point for the command-line tool.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loopback_oidc::auth::browser::{BrowserLauncher, SystemBrowser};
use loopback_oidc::auth::discovery::fetch_discovery;
use loopback_oidc::auth::flow::{default_http_client, LoginFlow};
use loopback_oidc::cli::{Cli, Commands};
use loopback_oidc::config::Config;
use loopback_oidc::{IdentityClaims, TokenSet};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config = Config::load(cli.config.as_deref(), &cli)?;

    match cli.command {
        Commands::Login { json, .. } => {
            config.validate()?;
            run_login(&config, json).await
        }
        Commands::Discover { .. } => {
            config.validate_for_discovery()?;
            let http = default_http_client()?;
            let doc = fetch_discovery(
                &http,
                &config.provider.issuer,
                config.flow_timeouts().http,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
    }
}

async fn run_login(config: &Config, json: bool) -> Result<()> {
    let open_browser = config.browser.open;
    let launcher = move |url: &str| {
        eprintln!("Open this URL to sign in:\n\n  {url}\n");
        if open_browser {
            SystemBrowser.open(url);
        }
    };

    let flow = LoginFlow::new(Arc::new(default_http_client()?), Arc::new(launcher))
        .with_timeouts(config.flow_timeouts());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let (claims, tokens) = flow
        .login_with_cancel(&config.to_login_config(), cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&claims, &tokens))?);
    } else {
        print_summary(&claims, &tokens);
    }
    Ok(())
}

fn print_summary(claims: &IdentityClaims, tokens: &TokenSet) {
    println!("Signed in as {}", claims.sub);
    if let Some(name) = &claims.name {
        println!("  name:          {name}");
    }
    if let Some(email) = &claims.email {
        println!("  email:         {email}");
    }
    println!("  access token:  {}", redact(&tokens.access_token));
    if let Some(id_token) = &tokens.id_token {
        println!("  id token:      {}", redact(id_token));
    }
    if tokens.refresh_token.is_some() {
        println!("  refresh token: <present>");
    }
    if let Some(expires_at) = tokens.expires_at() {
        println!("  expires at:    {}", expires_at.to_rfc3339());
    }
}

fn summary_json(claims: &IdentityClaims, tokens: &TokenSet) -> serde_json::Value {
    serde_json::json!({
        "claims": claims,
        "tokens": {
            "access_token": redact(&tokens.access_token),
            "id_token": tokens.id_token.as_deref().map(redact),
            "token_type": tokens.token_type,
            "scope": tokens.scope,
            "has_refresh_token": tokens.refresh_token.is_some(),
            "expires_at": tokens.expires_at().map(|t| t.to_rfc3339()),
        }
    })
}

/// Shows only a short prefix of a token.
fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}...({} chars)", token.chars().count())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "loopback_oidc=debug"
    } else {
        "loopback_oidc=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
