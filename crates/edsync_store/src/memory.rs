//! In-memory state store for testing.

use crate::error::StoreResult;
use crate::state::{PersistedState, StateStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// An in-memory state store.
///
/// Suitable for unit tests, integration tests, and ephemeral runs that
/// should not leave state behind.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RwLock<PersistedState>,
}

impl MemoryStateStore {
    /// Creates an empty store (never synced, unauthenticated).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with existing state.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> PersistedState {
        self.state.read().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    fn baseline(&self) -> (Option<DateTime<Utc>>, Option<String>) {
        let state = self.state.read();
        (state.last_update, state.checksum.clone())
    }

    fn set_baseline(
        &self,
        last_update: Option<DateTime<Utc>>,
        checksum: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        state.last_update = last_update;
        state.checksum = checksum;
        Ok(())
    }

    fn auth_token(&self) -> Option<String> {
        self.state.read().auth_token.clone()
    }

    fn set_auth_token(&self, token: &str) -> StoreResult<()> {
        self.state.write().auth_token = Some(token.to_string());
        Ok(())
    }

    fn clear_auth_token(&self) -> StoreResult<()> {
        self.state.write().auth_token = None;
        Ok(())
    }
}
