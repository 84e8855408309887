//! Configuration management for the loopback-oidc command-line tool
//!
//! Settings are layered: an optional YAML file, then environment
//! variables, then command-line flags. The library API never reads this;
//! it takes a [`LoginConfig`] from the caller.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::config::{FlowTimeouts, LoginConfig, DEFAULT_SCOPES};
use crate::cli::{Cli, Commands};
use crate::error::{LoginError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity provider and client registration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Bounds on network waits
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Browser launching
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Identity provider settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Issuer URL, e.g. `https://id.example.com/realms/main`
    #[serde(default)]
    pub issuer: String,

    /// OAuth client identifier
    #[serde(default)]
    pub client_id: String,

    /// Client secret, for providers that require one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Scopes to request
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Refuse to start without a client secret
    #[serde(default)]
    pub require_client_secret: bool,
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            client_secret: None,
            scopes: default_scopes(),
            require_client_secret: false,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .field("require_client_secret", &self.require_client_secret)
            .finish()
    }
}

/// Timeout settings, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long to wait for the browser redirect
    #[serde(default = "default_callback_seconds")]
    pub callback_seconds: u64,

    /// Bound on each outbound HTTP request
    #[serde(default = "default_http_seconds")]
    pub http_seconds: u64,
}

fn default_callback_seconds() -> u64 {
    300
}

fn default_http_seconds() -> u64 {
    15
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            callback_seconds: default_callback_seconds(),
            http_seconds: default_http_seconds(),
        }
    }
}

/// Browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Launch the system browser; when false the URL is only printed
    #[serde(default = "default_open_browser")]
    pub open: bool,
}

fn default_open_browser() -> bool {
    true
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            open: default_open_browser(),
        }
    }
}

impl Config {
    /// Load configuration with environment and CLI overrides
    ///
    /// A missing file at `path` is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Configuration`] if the file exists but cannot
    /// be read or parsed.
    pub fn load(path: Option<&str>, cli: &Cli) -> Result<Self> {
        let mut config = match path {
            Some(path) if Path::new(path).exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!("Config file not found at {}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoginError::Configuration(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| LoginError::Configuration(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(issuer) = std::env::var("OIDC_ISSUER") {
            self.provider.issuer = issuer;
        }

        if let Ok(client_id) = std::env::var("OIDC_CLIENT_ID") {
            self.provider.client_id = client_id;
        }

        if let Ok(secret) = std::env::var("OIDC_CLIENT_SECRET") {
            self.provider.client_secret = Some(secret);
        }

        if let Ok(scopes) = std::env::var("OIDC_SCOPES") {
            self.provider.scopes = scopes.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(timeout) = std::env::var("LOOPBACK_OIDC_CALLBACK_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.timeouts.callback_seconds = value;
            } else {
                tracing::warn!("Invalid LOOPBACK_OIDC_CALLBACK_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("LOOPBACK_OIDC_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.timeouts.http_seconds = value;
            } else {
                tracing::warn!("Invalid LOOPBACK_OIDC_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        match &cli.command {
            Commands::Login {
                issuer,
                client_id,
                scopes,
                no_browser,
                timeout,
                ..
            } => {
                if let Some(issuer) = issuer {
                    self.provider.issuer = issuer.clone();
                }
                if let Some(client_id) = client_id {
                    self.provider.client_id = client_id.clone();
                }
                if !scopes.is_empty() {
                    self.provider.scopes = scopes.clone();
                }
                if *no_browser {
                    self.browser.open = false;
                }
                if let Some(timeout) = timeout {
                    self.timeouts.callback_seconds = *timeout;
                }
            }
            Commands::Discover { issuer } => {
                if let Some(issuer) = issuer {
                    self.provider.issuer = issuer.clone();
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// Checks the timeouts, then the provider settings through
    /// [`LoginConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Configuration`] for the first failing check.
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.callback_seconds == 0 {
            return Err(LoginError::Configuration(
                "timeouts.callback_seconds must be greater than 0".to_string(),
            ));
        }

        if self.timeouts.http_seconds == 0 {
            return Err(LoginError::Configuration(
                "timeouts.http_seconds must be greater than 0".to_string(),
            ));
        }

        self.to_login_config().validate()
    }

    /// Validate only what `discover` needs: an issuer and an HTTP timeout
    pub fn validate_for_discovery(&self) -> Result<()> {
        if self.timeouts.http_seconds == 0 {
            return Err(LoginError::Configuration(
                "timeouts.http_seconds must be greater than 0".to_string(),
            ));
        }
        if self.provider.issuer.trim().is_empty() {
            return Err(LoginError::Configuration("issuer is required".to_string()));
        }
        Ok(())
    }

    /// The per-attempt settings handed to the login flow
    pub fn to_login_config(&self) -> LoginConfig {
        let provider = &self.provider;
        let mut login = LoginConfig::new(provider.issuer.clone(), provider.client_id.clone())
            .with_scopes(provider.scopes.iter().cloned());
        login.client_secret = provider.client_secret.clone();
        login.require_client_secret = provider.require_client_secret;
        login
    }

    pub fn flow_timeouts(&self) -> FlowTimeouts {
        FlowTimeouts {
            http: Duration::from_secs(self.timeouts.http_seconds),
            callback: Duration::from_secs(self.timeouts.callback_seconds),
        }
    }
}
