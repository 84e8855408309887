//! Per-attempt login settings
//!
//! [`LoginConfig`] is supplied by the caller and validated at call time.
//! Nothing in this module reads the process environment.

use std::time::Duration;

use url::{Host, Url};

use crate::error::{LoginError, Result};

/// Scopes requested when the caller does not choose any.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Provider and client settings for one login attempt.
///
/// # Examples
///
/// ```
/// use loopback_oidc::auth::config::LoginConfig;
///
/// let config = LoginConfig::new("https://id.example.com", "desktop-app")
///     .with_client_secret("s3cret");
/// assert!(config.validate().is_ok());
/// assert_eq!(config.scope_param(), "openid email profile");
/// ```
#[derive(Clone)]
pub struct LoginConfig {
    /// Issuer URL; the discovery document lives below it.
    pub issuer: String,

    /// OAuth client identifier registered with the provider.
    pub client_id: String,

    /// Client secret, for providers that issue one to native apps.
    pub client_secret: Option<String>,

    /// Requested scopes, in order. Must include `openid`.
    pub scopes: Vec<String>,

    /// Fail validation when no client secret is configured.
    pub require_client_secret: bool,
}

impl LoginConfig {
    /// Creates a config with the default `openid email profile` scopes and
    /// no client secret.
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            require_client_secret: false,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring_client_secret(mut self) -> Self {
        self.require_client_secret = true;
        self
    }

    /// The configured secret, treating an empty string as absent.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Scopes with duplicates removed, first occurrence kept.
    pub fn effective_scopes(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.scopes.len());
        for scope in &self.scopes {
            let scope = scope.as_str();
            if !seen.contains(&scope) {
                seen.push(scope);
            }
        }
        seen
    }

    /// The space-joined `scope` request parameter.
    pub fn scope_param(&self) -> String {
        self.effective_scopes().join(" ")
    }

    /// Checks that every required setting is present and well formed.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Configuration`] when:
    /// - `client_id` is empty;
    /// - `issuer` is not an absolute URL, or uses plain `http` for a host
    ///   other than the loopback interface;
    /// - `scopes` is missing `openid` or contains an empty or
    ///   whitespace-bearing entry;
    /// - a client secret is required but not configured.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(LoginError::Configuration("issuer is required".to_string()));
        }
        let issuer = Url::parse(&self.issuer).map_err(|e| {
            LoginError::Configuration(format!("issuer '{}' is not a valid URL: {e}", self.issuer))
        })?;
        match issuer.scheme() {
            "https" => {}
            "http" if is_loopback(&issuer) => {}
            scheme => {
                return Err(LoginError::Configuration(format!(
                    "issuer must use https (got '{scheme}')"
                )))
            }
        }
        if issuer.query().is_some() || issuer.fragment().is_some() {
            return Err(LoginError::Configuration(
                "issuer must not contain a query or fragment".to_string(),
            ));
        }

        if self.client_id.trim().is_empty() {
            return Err(LoginError::Configuration("client_id is required".to_string()));
        }

        if let Some(bad) = self
            .scopes
            .iter()
            .find(|s| s.is_empty() || s.chars().any(char::is_whitespace))
        {
            return Err(LoginError::Configuration(format!(
                "invalid scope entry '{bad}'"
            )));
        }
        if !self.scopes.iter().any(|s| s == "openid") {
            return Err(LoginError::Configuration(
                "scopes must include 'openid'".to_string(),
            ));
        }

        if self.require_client_secret && self.client_secret().is_none() {
            return Err(LoginError::Configuration(
                "client_secret is required for this provider".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .field("require_client_secret", &self.require_client_secret)
            .finish()
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Bounds on the suspension points of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimeouts {
    /// Bound on each outbound call: discovery, token exchange, userinfo.
    pub http: Duration,
    /// Bound on the wait for the browser redirect.
    pub callback: Duration,
}

impl Default for FlowTimeouts {
    fn default() -> Self {
        Self {
            http: Duration::from_secs(15),
            callback: Duration::from_secs(300),
        }
    }
}
