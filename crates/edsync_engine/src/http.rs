//! HTTP client abstraction.
//!
//! The engine never owns a network stack. Implement `HttpClient` to plug
//! in an actual HTTP library (ureq, reqwest, etc.) or a non-HTTP
//! transport for testing.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};

/// HTTP client abstraction used by the settings gateway.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;

    /// Sends a form-encoded POST request and returns the response body.
    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, String>;
}

/// Runs one HTTP call with bounded retries and a fixed inter-retry delay.
///
/// Only the transport layer retries here; application-level errors in a
/// successfully delivered response are the gateway's business.
pub fn with_retry<T>(
    retry: &RetryConfig,
    mut call: impl FnMut() -> Result<T, String>,
) -> SyncResult<T> {
    let mut last_error = String::new();
    for attempt in 0..retry.max_attempts.max(1) {
        if attempt > 0 {
            std::thread::sleep(retry.retry_delay);
        }
        match call() {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(attempt, error = %err, "transport attempt failed");
                last_error = err;
            }
        }
    }
    Err(SyncError::transport_retryable(last_error))
}

/// Trait for in-process servers that can answer loopback requests.
///
/// Useful for testing the full gateway flow without network overhead.
pub trait LoopbackServer {
    /// Handles a GET request for the given path (including query string).
    fn handle_get(&self, path: &str) -> Result<Vec<u8>, String>;

    /// Handles a form POST request for the given path.
    fn handle_post(&self, path: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, String>;
}

/// An HTTP client that routes requests directly to a loopback server.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client over the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }

    fn path_of(url: &str) -> &str {
        // Strip scheme and host; keep path + query.
        url.find("//")
            .and_then(|i| url[i + 2..].find('/').map(|j| &url[i + 2 + j..]))
            .unwrap_or(url)
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        self.server.handle_get(Self::path_of(url))
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, String> {
        self.server.handle_post(Self::path_of(url), fields)
    }
}
