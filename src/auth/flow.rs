//! Authorization code flow with PKCE and a loopback redirect
//!
//! [`LoginFlow`] drives one sign-in attempt through these stages:
//!
//! 1. Validate the [`LoginConfig`]; nothing touches the network on failure.
//! 2. Fetch the provider's discovery document.
//! 3. Generate `state`, `nonce`, and a PKCE pair; bind the loopback
//!    listener and derive `redirect_uri` from its port.
//! 4. Build the authorization URL and hand it to the [`BrowserLauncher`].
//! 5. Wait, bounded, for the browser redirect.
//! 6. Require a code and an exactly matching `state`.
//! 7. Exchange the code at the token endpoint, sending the verifier.
//! 8. Check the identity token, if any, and fetch the user's claims.
//!
//! Nothing is retried: the code and verifier are single-use.
//!
//! # References
//!
//! - RFC 6749 section 4.1 <https://www.rfc-editor.org/rfc/rfc6749#section-4.1>
//! - RFC 8252 OAuth 2.0 for Native Apps <https://www.rfc-editor.org/rfc/rfc8252>
//! - OpenID Connect Core 1.0 <https://openid.net/specs/openid-connect-core-1_0.html>

use std::future::Future;
use std::sync::Arc;

use reqwest::header::ACCEPT;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::browser::{BrowserLauncher, SystemBrowser};
use crate::auth::callback::{CallbackResult, CallbackServer};
use crate::auth::config::{FlowTimeouts, LoginConfig};
use crate::auth::discovery::fetch_discovery;
use crate::auth::id_token;
use crate::auth::pkce::{PkcePair, CHALLENGE_METHOD};
use crate::auth::state::AttemptState;
use crate::auth::token::{describe_error_body, TokenResponse, TokenSet};
use crate::auth::userinfo::{fetch_userinfo, IdentityClaims};
use crate::error::{FailureKind, LoginError, Result};

/// Where a login attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    NotStarted,
    DiscoveryPending,
    /// The browser has been pointed at the provider; waiting for the redirect.
    AwaitingRedirect,
    ExchangingCode,
    FetchingProfile,
    Succeeded,
    Failed(FailureKind),
}

impl LoginStage {
    /// `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Runs OIDC sign-in attempts for a native client.
///
/// A `LoginFlow` holds no per-attempt state besides the observable
/// [`LoginStage`]; every call to [`login`](Self::login) generates fresh
/// randomness and binds a fresh listener. Run one attempt at a time per
/// flow if the stage channel is observed.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use loopback_oidc::auth::browser::SystemBrowser;
/// use loopback_oidc::auth::config::LoginConfig;
/// use loopback_oidc::auth::flow::LoginFlow;
///
/// # async fn example() -> loopback_oidc::error::Result<()> {
/// let flow = LoginFlow::new(Arc::new(reqwest::Client::new()), Arc::new(SystemBrowser));
/// let config = LoginConfig::new("https://id.example.com", "desktop-app");
/// let (claims, tokens) = flow.login(&config).await?;
/// println!("signed in as {}", claims.sub);
/// # Ok(())
/// # }
/// ```
pub struct LoginFlow {
    http: Arc<reqwest::Client>,
    launcher: Arc<dyn BrowserLauncher>,
    timeouts: FlowTimeouts,
    stage: watch::Sender<LoginStage>,
}

impl LoginFlow {
    /// Creates a flow using `http` for outbound calls and `launcher` to
    /// show the authorization URL.
    pub fn new(http: Arc<reqwest::Client>, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let (stage, _) = watch::channel(LoginStage::NotStarted);
        Self {
            http,
            launcher,
            timeouts: FlowTimeouts::default(),
            stage,
        }
    }

    /// Creates a flow with a default HTTP client and the platform browser.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Configuration`] if the HTTP client cannot be
    /// built (e.g. no TLS backend).
    pub fn with_system_browser() -> Result<Self> {
        Ok(Self::new(Arc::new(default_http_client()?), Arc::new(SystemBrowser)))
    }

    pub fn with_timeouts(mut self, timeouts: FlowTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> FlowTimeouts {
        self.timeouts
    }

    /// Subscribes to stage transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoginStage> {
        self.stage.subscribe()
    }

    /// The most recent stage.
    pub fn stage(&self) -> LoginStage {
        *self.stage.borrow()
    }

    /// Runs one sign-in attempt.
    ///
    /// # Errors
    ///
    /// Returns the [`LoginError`] of the first failing step; see the module
    /// documentation for the order of steps.
    pub async fn login(&self, config: &LoginConfig) -> Result<(IdentityClaims, TokenSet)> {
        self.login_with_cancel(config, CancellationToken::new()).await
    }

    /// Runs one sign-in attempt that stops with [`LoginError::Cancelled`]
    /// once `cancel` is cancelled. Cancelling closes the loopback listener.
    pub async fn login_with_cancel(
        &self,
        config: &LoginConfig,
        cancel: CancellationToken,
    ) -> Result<(IdentityClaims, TokenSet)> {
        self.set_stage(LoginStage::NotStarted);
        let outcome = self.run(config, &cancel).await;
        match &outcome {
            Ok((claims, _)) => {
                tracing::info!(sub = %claims.sub, "sign-in succeeded");
                self.set_stage(LoginStage::Succeeded);
            }
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), error = %e, "sign-in failed");
                self.set_stage(LoginStage::Failed(e.kind()));
            }
        }
        outcome
    }

    async fn run(
        &self,
        config: &LoginConfig,
        cancel: &CancellationToken,
    ) -> Result<(IdentityClaims, TokenSet)> {
        config.validate()?;

        self.set_stage(LoginStage::DiscoveryPending);
        let discovery = until_cancelled(
            cancel,
            fetch_discovery(&self.http, &config.issuer, self.timeouts.http),
        )
        .await?;

        let attempt = AttemptState::generate()?;
        let pkce = PkcePair::generate()?;
        let server = CallbackServer::bind().await?;
        let redirect_uri = server.redirect_uri();
        let pending = server.spawn(cancel.clone());

        let auth_url = build_authorization_url(
            &discovery.authorization_endpoint,
            config,
            &redirect_uri,
            &attempt,
            &pkce,
        )?;

        self.set_stage(LoginStage::AwaitingRedirect);
        tracing::info!(
            endpoint = %discovery.authorization_endpoint,
            "opening browser for sign-in"
        );
        self.launcher.open(auth_url.as_str());

        let callback = pending.wait(self.timeouts.callback).await?;
        let code = validate_callback(callback, &attempt)?;

        self.set_stage(LoginStage::ExchangingCode);
        let tokens = until_cancelled(
            cancel,
            self.exchange_code(&discovery.token_endpoint, config, &code, &redirect_uri, pkce),
        )
        .await?;

        let id_claims = match tokens.id_token.as_deref() {
            Some(token) => Some(id_token::verify(
                token,
                &config.issuer,
                &config.client_id,
                attempt.nonce(),
            )?),
            None => None,
        };

        self.set_stage(LoginStage::FetchingProfile);
        let userinfo = tokio::select! {
            _ = cancel.cancelled() => return Err(LoginError::Cancelled),
            userinfo = fetch_userinfo(
                &self.http,
                &discovery.userinfo_endpoint,
                &tokens.access_token,
                self.timeouts.http,
            ) => userinfo,
        };
        let claims = match userinfo {
            Ok(claims) => claims,
            Err(message) => {
                return Err(LoginError::ProfileFetch {
                    message,
                    tokens: Box::new(tokens),
                })
            }
        };

        if let Some(id_claims) = id_claims {
            if id_claims.sub != claims.sub {
                return Err(LoginError::ProfileFetch {
                    message: "userinfo 'sub' does not match the identity token".to_string(),
                    tokens: Box::new(tokens),
                });
            }
        }

        Ok((claims, tokens))
    }

    /// Exchanges the authorization code. Consumes the PKCE pair: the
    /// verifier leaves memory with this request.
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        config: &LoginConfig,
        code: &str,
        redirect_uri: &str,
        pkce: PkcePair,
    ) -> Result<TokenSet> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &config.client_id),
        ];
        if let Some(secret) = config.client_secret() {
            form.push(("client_secret", secret));
        }
        form.push(("code_verifier", pkce.verifier()));

        tracing::debug!(endpoint = token_endpoint, "exchanging authorization code");
        let resp = self
            .http
            .post(token_endpoint)
            .header(ACCEPT, "application/json")
            .form(&form)
            .timeout(self.timeouts.http)
            .send()
            .await
            .map_err(|e| LoginError::TokenExchange(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LoginError::TokenExchange(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(LoginError::TokenExchange(match describe_error_body(&body) {
                Some(detail) => format!("token endpoint returned {status}: {detail}"),
                None => format!("token endpoint returned {status}"),
            }));
        }

        let raw: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            LoginError::TokenExchange(format!("failed to parse token response: {e}"))
        })?;
        let tokens = raw.into_token_set();
        if tokens.access_token.is_empty() {
            return Err(LoginError::TokenExchange(
                "token endpoint returned an empty access token".to_string(),
            ));
        }
        Ok(tokens)
    }

    fn set_stage(&self, stage: LoginStage) {
        tracing::debug!(?stage, "login stage");
        self.stage.send_replace(stage);
    }
}

/// Runs a login with the platform browser and default timeouts.
///
/// This is the entry point for embedders that need nothing more than
/// "sign the user in and hand back who they are".
///
/// # Errors
///
/// See [`LoginFlow::login`].
pub async fn login(config: LoginConfig) -> Result<(IdentityClaims, TokenSet)> {
    LoginFlow::with_system_browser()?.login(&config).await
}

/// Builds the HTTP client used when the caller does not supply one.
pub fn default_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(FlowTimeouts::default().http)
        .user_agent(concat!("loopback-oidc/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LoginError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Builds the authorization request URL.
///
/// # Errors
///
/// Returns [`LoginError::Discovery`] if `authorization_endpoint` is not a
/// valid URL.
pub fn build_authorization_url(
    authorization_endpoint: &str,
    config: &LoginConfig,
    redirect_uri: &str,
    attempt: &AttemptState,
    pkce: &PkcePair,
) -> Result<Url> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| {
        LoginError::Discovery(format!("invalid authorization endpoint URL: {e}"))
    })?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &config.scope_param())
        .append_pair("state", attempt.state())
        .append_pair("nonce", attempt.nonce())
        .append_pair("code_challenge", pkce.challenge())
        .append_pair("code_challenge_method", CHALLENGE_METHOD);

    Ok(url)
}

/// Consumes the redirect and returns the authorization code.
///
/// # Errors
///
/// - [`LoginError::MissingCode`] when the redirect carries no code.
/// - [`LoginError::StateMismatch`] when `state` is absent or differs from
///   the attempt's value in any byte.
pub fn validate_callback(callback: CallbackResult, attempt: &AttemptState) -> Result<String> {
    let CallbackResult {
        code,
        state,
        error,
        error_description,
    } = callback;

    let Some(code) = code.filter(|c| !c.is_empty()) else {
        let provider_error = match (error, error_description) {
            (Some(error), Some(desc)) => Some(format!("{error} ({desc})")),
            (error, _) => error,
        };
        return Err(LoginError::MissingCode { provider_error });
    };

    match state {
        Some(returned) if attempt.matches_state(&returned) => Ok(code),
        _ => Err(LoginError::StateMismatch),
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LoginError::Cancelled),
        outcome = fut => outcome,
    }
}
