//! The state store trait and its persisted record.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The durable sync state of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Last point in time the client considered itself in sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Snapshot checksum taken at `last_update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Cached auth token for the remote gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Durable storage for the client's sync baseline and credentials.
///
/// # Invariants
///
/// - `baseline()` returns the timestamp and checksum as one consistent
///   pair; `set_baseline` writes them together.
/// - State survives process restart for durable implementations.
/// - Implementations must be `Send + Sync`; the orchestrator and apply
///   handlers share one store.
pub trait StateStore: Send + Sync {
    /// Returns the last client update timestamp.
    fn last_update(&self) -> Option<DateTime<Utc>>;

    /// Returns the `(last_update, checksum)` pair, read together.
    fn baseline(&self) -> (Option<DateTime<Utc>>, Option<String>);

    /// Overwrites the baseline pair.
    fn set_baseline(
        &self,
        last_update: Option<DateTime<Utc>>,
        checksum: Option<String>,
    ) -> StoreResult<()>;

    /// Returns the cached auth token.
    fn auth_token(&self) -> Option<String>;

    /// Stores an auth token.
    fn set_auth_token(&self, token: &str) -> StoreResult<()>;

    /// Forgets the auth token (e.g. after the server rejected it).
    fn clear_auth_token(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_state_serde_omits_absent_fields() {
        let state = PersistedState::default();
        assert_eq!(serde_json::to_string(&state).unwrap(), "{}");

        let parsed: PersistedState = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, state);
    }
}
