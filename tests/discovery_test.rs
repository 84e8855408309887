//! OIDC discovery integration tests using wiremock
//!
//! Verifies `fetch_discovery` against a mocked provider: a single bounded
//! GET, validation of the returned endpoints, and error mapping.

mod common;

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loopback_oidc::auth::discovery::{fetch_discovery, WELL_KNOWN_PATH};
use loopback_oidc::LoginError;

use common::{discovery_body, http_client};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn serve_discovery(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

fn assert_discovery_error(err: LoginError, needle: &str) {
    match err {
        LoginError::Discovery(msg) => {
            assert!(msg.contains(needle), "expected '{needle}' in '{msg}'")
        }
        other => panic!("expected discovery error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_discovery_success() {
    let server = MockServer::start().await;
    serve_discovery(
        &server,
        ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())),
    )
    .await;

    let doc = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .expect("discovery should succeed");

    assert_eq!(doc.authorization_endpoint, format!("{}/authorize", server.uri()));
    assert_eq!(doc.token_endpoint, format!("{}/token", server.uri()));
    assert_eq!(doc.userinfo_endpoint, format!("{}/userinfo", server.uri()));
    assert_eq!(doc.jwks_uri, Some(format!("{}/jwks", server.uri())));
    assert!(doc.extra.contains_key("response_types_supported"));

    server.verify().await;
}

#[tokio::test]
async fn test_fetch_discovery_accepts_trailing_slash_issuer() {
    let server = MockServer::start().await;
    serve_discovery(
        &server,
        ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())),
    )
    .await;

    let issuer = format!("{}/", server.uri());
    assert!(fetch_discovery(&http_client(), &issuer, TIMEOUT).await.is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_fetch_discovery_non_success_status() {
    let server = MockServer::start().await;
    serve_discovery(&server, ResponseTemplate::new(404)).await;

    let err = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "404");
}

#[tokio::test]
async fn test_fetch_discovery_malformed_json() {
    let server = MockServer::start().await;
    serve_discovery(&server, ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

    let err = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "failed to parse");
}

#[tokio::test]
async fn test_fetch_discovery_missing_userinfo_endpoint() {
    let server = MockServer::start().await;
    let mut body = discovery_body(&server.uri());
    body.as_object_mut().unwrap().remove("userinfo_endpoint");
    serve_discovery(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let err = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "userinfo_endpoint");
}

#[tokio::test]
async fn test_fetch_discovery_issuer_mismatch() {
    let server = MockServer::start().await;
    let mut body = discovery_body(&server.uri());
    body["issuer"] = serde_json::json!("https://attacker.example.com");
    serve_discovery(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let err = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "issuer mismatch");
}

#[tokio::test]
async fn test_fetch_discovery_requires_s256_when_methods_advertised() {
    let server = MockServer::start().await;
    let mut body = discovery_body(&server.uri());
    body["code_challenge_methods_supported"] = serde_json::json!(["plain"]);
    serve_discovery(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let err = fetch_discovery(&http_client(), &server.uri(), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "S256");
}

#[tokio::test]
async fn test_fetch_discovery_times_out() {
    let server = MockServer::start().await;
    serve_discovery(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(discovery_body(&server.uri()))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = fetch_discovery(&http_client(), &server.uri(), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_discovery_error(err, "timed out");
}

#[tokio::test]
async fn test_fetch_discovery_unreachable_issuer() {
    // Bind then drop a listener to get a port nothing is serving on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = fetch_discovery(&http_client(), &format!("http://127.0.0.1:{port}"), TIMEOUT)
        .await
        .unwrap_err();
    assert_discovery_error(err, "discovery request failed");
}
