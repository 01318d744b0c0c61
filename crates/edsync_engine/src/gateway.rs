//! Remote settings gateway.
//!
//! Talks to the settings service: the lightweight info record, the full
//! snapshot, and snapshot saves. Handles token-based auth (including the
//! interactive authentication flow and automatic re-authentication when
//! the server rejects a cached token) and short-TTL response caching.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{with_retry, HttpClient};
use edsync_protocol::{SaveOutcome, SettingsInfo, SettingsSnapshot};
use edsync_store::StateStore;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

const INFO_PATH: &str = "/package-sync/lastUpdate";
const SETTINGS_PATH: &str = "/package-sync/settings";
const AUTH_PATH: &str = "/authentication";

/// Server error string that means the cached token is no longer valid.
const INVALID_TOKEN: &str = "Invalid token";
/// Automatic re-authentications per request before hard failure.
const MAX_REAUTH: u32 = 3;

/// Outcome of the interactive authentication flow, decoded from the
/// window title the provider sets on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// The user authorized; carries the provider token.
    Success(String),
    /// The provider denied authorization; carries the reason.
    Denied(String),
}

/// Parses an authentication window title into a signal.
///
/// Titles encode the outcome as `Success=<token>` or `Denied=<reason>`,
/// possibly preceded by other words.
pub fn parse_auth_title(title: &str) -> Option<AuthSignal> {
    for word in title.split_whitespace() {
        if let Some(token) = word.strip_prefix("Success=") {
            return Some(AuthSignal::Success(token.to_string()));
        }
        if let Some(reason) = word.strip_prefix("Denied=") {
            return Some(AuthSignal::Denied(reason.to_string()));
        }
    }
    None
}

/// The interactive authentication flow.
///
/// Implementations drive whatever UI the host offers (a browser window
/// that ends with an [`AuthSignal`] title, a pasted code, a fixed token
/// in tests) and resolve to a provider token. A user closing the window
/// is `Err(SyncError::AuthWindowClosed)`.
pub trait Authenticator: Send + Sync {
    /// Obtains a provider token, interacting with the user if needed.
    fn authenticate(&self) -> SyncResult<String>;
}

/// An authenticator that always returns a fixed provider token.
pub struct StaticAuthenticator {
    token: String,
}

impl StaticAuthenticator {
    /// Creates an authenticator around a fixed token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self) -> SyncResult<String> {
        Ok(self.token.clone())
    }
}

/// Gateway to the remote settings service.
pub struct SettingsGateway<C: HttpClient, A: Authenticator> {
    base_url: String,
    client: C,
    authenticator: A,
    store: Arc<dyn StateStore>,
    retry: RetryConfig,
    cache_ttl: Duration,
    info_cache: Mutex<Option<(Instant, SettingsInfo)>>,
    snapshot_cache: Mutex<Option<(Instant, SettingsSnapshot)>>,
}

impl<C: HttpClient, A: Authenticator> SettingsGateway<C, A> {
    /// Creates a gateway for the given service.
    pub fn new(
        base_url: impl Into<String>,
        client: C,
        authenticator: A,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            authenticator,
            store,
            retry: RetryConfig::default(),
            cache_ttl: Duration::from_secs(45),
            info_cache: Mutex::new(None),
            snapshot_cache: Mutex::new(None),
        }
    }

    /// Sets the transport retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the response cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Returns the service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the lightweight info record, cached within the TTL.
    pub fn fetch_info(&self) -> SyncResult<SettingsInfo> {
        if let Some(info) = read_cache(&self.info_cache, self.cache_ttl) {
            return Ok(info);
        }
        let info: SettingsInfo = self.get_json(INFO_PATH)?;
        *self.info_cache.lock() = Some((Instant::now(), info.clone()));
        Ok(info)
    }

    /// Fetches the full settings snapshot, cached within the TTL.
    pub fn fetch_snapshot(&self) -> SyncResult<SettingsSnapshot> {
        if let Some(snapshot) = read_cache(&self.snapshot_cache, self.cache_ttl) {
            return Ok(snapshot);
        }
        let snapshot: SettingsSnapshot = self.get_json(SETTINGS_PATH)?;
        *self.snapshot_cache.lock() = Some((Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }

    /// Saves a snapshot and invalidates the caches.
    ///
    /// Application-level save failures surface as `success == false` in
    /// the outcome, not as errors.
    pub fn save_snapshot(&self, snapshot: &SettingsSnapshot) -> SyncResult<SaveOutcome> {
        let token = self.token()?;
        let serialized = serde_json::to_string(snapshot)?;
        let url = format!("{}{}", self.base_url, SETTINGS_PATH);
        let body = with_retry(&self.retry, || {
            self.client
                .post_form(&url, &[("token", &token), ("settings", &serialized)])
        })?;
        let outcome: SaveOutcome = serde_json::from_slice(&body)?;
        self.invalidate_caches();
        Ok(outcome)
    }

    /// Drops any cached info/snapshot responses.
    pub fn invalidate_caches(&self) {
        *self.info_cache.lock() = None;
        *self.snapshot_cache.lock() = None;
    }

    /// Returns the cached token, running the authentication flow if the
    /// store holds none.
    fn token(&self) -> SyncResult<String> {
        if let Some(token) = self.store.auth_token() {
            return Ok(token);
        }
        self.authenticate_and_store()
    }

    /// Runs the interactive flow, exchanges the provider token for a
    /// service token, and persists it.
    fn authenticate_and_store(&self) -> SyncResult<String> {
        let provider_token = self.authenticator.authenticate()?;

        let url = format!("{}{}", self.base_url, AUTH_PATH);
        let body = with_retry(&self.retry, || {
            self.client.post_form(
                &url,
                &[
                    ("token", &provider_token),
                    ("tokenType", "2"),
                    ("returnToken", "true"),
                ],
            )
        })?;

        let value: serde_json::Value = serde_json::from_slice(&body)?;
        let token = value
            .get("token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SyncError::AuthDenied("no token in exchange response".into()))?;

        self.store.set_auth_token(token)?;
        Ok(token.to_string())
    }

    /// GET with token auth and automatic re-authentication.
    ///
    /// A server `Invalid token` response clears the stored token and
    /// re-runs the flow, at most [`MAX_REAUTH`] times per request.
    fn get_json<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let mut reauths = 0;
        loop {
            let token = self.token()?;
            let url = format!("{}{}?token={}", self.base_url, path, token);
            let body = with_retry(&self.retry, || self.client.get(&url))?;
            let value: serde_json::Value = serde_json::from_slice(&body)?;

            if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
                if error == INVALID_TOKEN {
                    if reauths < MAX_REAUTH {
                        reauths += 1;
                        tracing::debug!(reauths, "stored token rejected, re-authenticating");
                        self.store.clear_auth_token()?;
                        continue;
                    }
                    return Err(SyncError::AuthRejected { attempts: reauths });
                }
                return Err(SyncError::Server(error.to_string()));
            }

            return Ok(serde_json::from_value(value)?);
        }
    }
}

fn read_cache<T: Clone>(cache: &Mutex<Option<(Instant, T)>>, ttl: Duration) -> Option<T> {
    let guard = cache.lock();
    match guard.as_ref() {
        Some((stored, value)) if stored.elapsed() < ttl => Some(value.clone()),
        _ => None,
    }
}
