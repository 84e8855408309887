//! Shared fixtures for login flow integration tests
//!
//! A wiremock server stands in for the identity provider. The "browser" is
//! a launcher that reads the authorization URL and requests the loopback
//! redirect itself.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loopback_oidc::auth::discovery::WELL_KNOWN_PATH;
use loopback_oidc::{BrowserLauncher, FlowTimeouts, LoginConfig};

pub const CLIENT_ID: &str = "desktop-app";

/// A client that never goes through an environment proxy.
pub fn http_client() -> Arc<reqwest::Client> {
    Arc::new(
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("failed to build HTTP client"),
    )
}

pub fn test_timeouts() -> FlowTimeouts {
    FlowTimeouts {
        http: Duration::from_secs(5),
        callback: Duration::from_secs(10),
    }
}

pub fn login_config(server: &MockServer) -> LoginConfig {
    LoginConfig::new(server.uri(), CLIENT_ID)
}

pub fn discovery_body(base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{base_url}/authorize"),
        "token_endpoint": format!("{base_url}/token"),
        "userinfo_endpoint": format!("{base_url}/userinfo"),
        "jwks_uri": format!("{base_url}/jwks"),
        "code_challenge_methods_supported": ["S256"],
        "response_types_supported": ["code"]
    })
}

pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())))
        .mount(server)
        .await;
}

pub fn token_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "tok",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "scope": "openid email profile"
    })
}

pub fn userinfo_body() -> serde_json::Value {
    serde_json::json!({
        "sub": "user-42",
        "name": "Ada",
        "email": "ada@example.com",
        "email_verified": true
    })
}

/// Query parameters of a URL, first occurrence of each key.
pub fn query_params(url: &str) -> HashMap<String, String> {
    let url = Url::parse(url).expect("launcher received an invalid URL");
    let mut params = HashMap::new();
    for (k, v) in url.query_pairs() {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    params
}

/// Authorization URLs handed to a test launcher.
#[derive(Clone, Default)]
pub struct Opened(Arc<Mutex<Vec<String>>>);

impl Opened {
    pub fn urls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn last_params(&self) -> HashMap<String, String> {
        let urls = self.urls();
        let last = urls.last().expect("launcher was never called");
        query_params(last)
    }

    fn push(&self, url: &str) {
        self.0.lock().unwrap().push(url.to_string());
    }
}

/// A launcher that only records the URL, leaving the redirect to never
/// arrive.
pub fn idle_browser() -> (Arc<dyn BrowserLauncher>, Opened) {
    let opened = Opened::default();
    let sink = opened.clone();
    let launcher = move |url: &str| sink.push(url);
    (Arc::new(launcher), opened)
}

/// A launcher that follows the authorization URL straight to the loopback
/// redirect with the query produced by `query(auth_params)`.
pub fn redirecting_browser<F>(query: F) -> (Arc<dyn BrowserLauncher>, Opened)
where
    F: Fn(&HashMap<String, String>) -> String + Send + Sync + 'static,
{
    let opened = Opened::default();
    let sink = opened.clone();
    let launcher = move |url: &str| {
        sink.push(url);
        let params = query_params(url);
        let redirect = format!("{}?{}", params["redirect_uri"], query(&params));
        tokio::spawn(async move {
            let client = reqwest::Client::builder().no_proxy().build().unwrap();
            let _ = client.get(redirect).send().await;
        });
    };
    (Arc::new(launcher), opened)
}

/// A browser whose user approves the request: the provider redirects back
/// with `code=abc123` and the original `state`.
pub fn approving_browser() -> (Arc<dyn BrowserLauncher>, Opened) {
    redirecting_browser(|params| format!("code=abc123&state={}", params["state"]))
}

/// Parses an `application/x-www-form-urlencoded` request body.
pub fn form_params(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}
