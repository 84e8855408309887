//! Command-line interface definition for loopback-oidc
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};

/// loopback-oidc - sign in to an OpenID Connect provider from the terminal
///
/// Opens the provider's sign-in page in a browser and receives the redirect
/// on a temporary listener bound to 127.0.0.1.
#[derive(Parser, Debug, Clone)]
#[command(name = "loopback-oidc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in and print the user's identity
    Login {
        /// Override the issuer URL
        #[arg(long)]
        issuer: Option<String>,

        /// Override the OAuth client identifier
        #[arg(long)]
        client_id: Option<String>,

        /// Scope to request; repeat for several (replaces the configured list)
        #[arg(long = "scope", value_name = "SCOPE")]
        scopes: Vec<String>,

        /// Print the authorization URL instead of launching a browser
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the browser redirect
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch and print the provider's discovery document
    Discover {
        /// Override the issuer URL
        #[arg(long)]
        issuer: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            verbose: false,
            command: Commands::Login {
                issuer: None,
                client_id: None,
                scopes: Vec::new(),
                no_browser: false,
                timeout: None,
                json: false,
            },
        }
    }
}
