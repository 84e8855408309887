//! Opening the authorization URL in the user's browser
//!
//! Launching is best effort. The flow never depends on it succeeding: the
//! user can always open the URL by hand, and a failed launch logs it.

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
use std::process::{Command, Stdio};

/// Something that can show a URL to the user.
///
/// Implemented for any `Fn(&str)` closure, which is how tests and GUI
/// embeddings plug in their own behaviour.
pub trait BrowserLauncher: Send + Sync {
    /// Opens `url`. Failures are swallowed.
    fn open(&self, url: &str);
}

impl<F> BrowserLauncher for F
where
    F: Fn(&str) + Send + Sync,
{
    fn open(&self, url: &str) {
        self(url)
    }
}

/// Opens URLs with the platform's default handler.
///
/// Under WSL the Windows browser is reached through `wslview`; everywhere
/// else the `webbrowser` crate picks the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) {
        match launch(url) {
            Ok(()) => tracing::debug!("browser launched"),
            Err(e) => tracing::warn!(
                error = %e,
                url,
                "failed to launch browser; open the URL manually to sign in"
            ),
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launch(url: &str) -> std::io::Result<()> {
    if is_wsl() {
        wslview_command(url).spawn().map(|_| ())
    } else {
        webbrowser::open(url)
    }
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn launch(url: &str) -> std::io::Result<()> {
    webbrowser::open(url)
}

/// `wslview <url>`, with the URL passed as a single argument.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn wslview_command(url: &str) -> Command {
    let mut command = Command::new("wslview");
    command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// Detects Windows Subsystem for Linux from the kernel version string.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|v| kernel_is_wsl(&v))
        .unwrap_or(false)
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn kernel_is_wsl(version: &str) -> bool {
    version.to_ascii_lowercase().contains("microsoft")
}
