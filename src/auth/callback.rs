//! Loopback redirect listener
//!
//! A single-shot HTTP listener bound to `127.0.0.1` on an OS-assigned port.
//! It runs on its own tokio task, waits for the provider's redirect to
//! `GET /callback`, captures the query parameters, answers with a static
//! confirmation page, and stops.
//!
//! The foreground waits on a `oneshot` channel with a bounded timeout. On
//! every exit path the listener task is stopped so the port is released.
//! Request contents are never logged.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{LoginError, Result};

/// Path the provider redirects the browser to.
pub const CALLBACK_PATH: &str = "/callback";

/// Page shown in the browser once the redirect has been captured.
pub const CONFIRMATION_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Signed in</title></head>\
<body><h1>Signed in</h1><p>You can close this window.</p></body></html>";

/// Deadline for a connection to deliver its request head.
const READ_DEADLINE: Duration = Duration::from_secs(10);

/// Upper bound on header lines read from one request.
const MAX_HEADER_LINES: usize = 100;

/// Query parameters captured from the redirect.
///
/// Not `Clone`: the value produced by the listener is moved into the
/// orchestrator and consumed once.
pub struct CallbackResult {
    /// The authorization code, absent when the provider reported an error.
    pub code: Option<String>,
    /// The `state` echoed back by the provider.
    pub state: Option<String>,
    /// OAuth `error` code reported by the provider (e.g. `access_denied`).
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackResult {
    /// Parses a percent-encoded query string. The first occurrence of a
    /// repeated key wins.
    pub fn from_query(query: &str) -> Self {
        let mut result = Self {
            code: None,
            state: None,
            error: None,
            error_description: None,
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut result.code,
                "state" => &mut result.state,
                "error" => &mut result.error,
                "error_description" => &mut result.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        result
    }
}

impl fmt::Debug for CallbackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackResult")
            .field("code", &self.code.as_ref().map(|_| "<redacted>"))
            .field("state", &self.state)
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .finish()
    }
}

/// Builds the redirect URI served by a listener on `port`.
pub fn redirect_uri_for(port: u16) -> String {
    format!("http://127.0.0.1:{port}{CALLBACK_PATH}")
}

/// A bound, not yet running, loopback listener.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use loopback_oidc::auth::callback::CallbackServer;
///
/// # async fn example() -> loopback_oidc::error::Result<()> {
/// let server = CallbackServer::bind().await?;
/// let redirect_uri = server.redirect_uri();
/// let pending = server.spawn(CancellationToken::new());
/// // ... send the browser to the provider with `redirect_uri` ...
/// let callback = pending.wait(Duration::from_secs(300)).await?;
/// # Ok(())
/// # }
/// ```
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

impl CallbackServer {
    /// Binds `127.0.0.1:0` and records the port the OS assigned.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Callback`] if the socket cannot be bound.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .map_err(|e| LoginError::Callback(format!("failed to bind loopback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| LoginError::Callback(format!("failed to read listener address: {e}")))?
            .port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The exact `redirect_uri` to send in the authorization request.
    pub fn redirect_uri(&self) -> String {
        redirect_uri_for(self.port)
    }

    /// Starts the accept loop on a background task.
    ///
    /// Cancelling `cancel` stops the listener; the task never cancels the
    /// caller's token itself.
    pub fn spawn(self, cancel: CancellationToken) -> PendingCallback {
        let (tx, rx) = oneshot::channel();
        let stop = cancel.child_token();
        tracing::debug!(port = self.port, "loopback listener started");
        let task = tokio::spawn(serve(self.listener, tx, stop.clone()));
        PendingCallback {
            rx,
            task,
            stop,
            port: self.port,
        }
    }
}

/// Handle to a running listener; resolves to the captured redirect.
///
/// Dropping the handle stops the listener.
pub struct PendingCallback {
    rx: oneshot::Receiver<CallbackResult>,
    task: JoinHandle<()>,
    stop: CancellationToken,
    port: u16,
}

impl PendingCallback {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the redirect, at most `timeout`.
    ///
    /// The listener task is stopped and joined before this returns, so the
    /// port is no longer bound afterwards regardless of the outcome.
    ///
    /// # Errors
    ///
    /// - [`LoginError::Timeout`] when no redirect arrives in time.
    /// - [`LoginError::Cancelled`] when the token given to
    ///   [`CallbackServer::spawn`] is cancelled.
    /// - [`LoginError::Callback`] when the listener stops for any other reason.
    pub async fn wait(mut self, timeout: Duration) -> Result<CallbackResult> {
        let outcome = tokio::time::timeout(timeout, &mut self.rx).await;
        let cancelled = self.stop.is_cancelled();

        self.stop.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "loopback listener task failed");
        }
        tracing::debug!(port = self.port, "loopback listener closed");

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) if cancelled => Err(LoginError::Cancelled),
            Ok(Err(_)) => Err(LoginError::Callback(
                "listener stopped before the redirect arrived".to_string(),
            )),
            Err(_) => Err(LoginError::Timeout(timeout)),
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Accept loop: serves until the first `GET /callback`, cancellation, or an
/// accept failure. Returning drops the listener.
///
/// Each connection is read on its own task, so an idle connection (browsers
/// open speculative ones) cannot hold up the redirect.
async fn serve(
    listener: TcpListener,
    tx: oneshot::Sender<CallbackResult>,
    stop: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        let joined = tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    connections.spawn(tokio::time::timeout(
                        READ_DEADLINE,
                        handle_connection(stream),
                    ));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "loopback listener accept failed");
                    break;
                }
            },
            Some(joined) = connections.join_next() => joined,
        };

        match joined {
            Ok(Ok(Ok(Some(result)))) => {
                let _ = tx.send(result);
                break;
            }
            Ok(Ok(Ok(None))) => {}
            Ok(Ok(Err(e))) => tracing::debug!(error = %e, "ignoring unreadable loopback request"),
            Ok(Err(_)) => tracing::debug!("loopback connection idle past read deadline"),
            Err(e) => tracing::debug!(error = %e, "loopback connection task failed"),
        }
    }

    connections.shutdown().await;
}

/// Reads one request. Returns `Some` only for `GET /callback`; anything else
/// is answered with `404` and leaves the listener waiting.
async fn handle_connection(mut stream: TcpStream) -> std::io::Result<Option<CallbackResult>> {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    let Some(request_line) = lines.next_line().await? else {
        return Ok(None);
    };
    let mut header_lines = 0;
    while let Some(line) = lines.next_line().await? {
        header_lines += 1;
        if line.is_empty() || header_lines > MAX_HEADER_LINES {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if method != "GET" || path != CALLBACK_PATH {
        write_response(
            &mut writer,
            "404 Not Found",
            "text/plain; charset=utf-8",
            "Not found",
        )
        .await?;
        return Ok(None);
    }

    let result = CallbackResult::from_query(query);
    if let Err(e) = write_response(
        &mut writer,
        "200 OK",
        "text/html; charset=utf-8",
        CONFIRMATION_PAGE,
    )
    .await
    {
        // The redirect was captured; a browser that went away early is fine.
        tracing::debug!(error = %e, "failed to send confirmation page");
    }
    Ok(Some(result))
}

async fn write_response<W>(
    writer: &mut W,
    status: &str,
    content_type: &str,
    body: &str,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Cache-Control: no-store\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await
}
