//! File-backed state store.

use crate::error::{StoreError, StoreResult};
use crate::state::{PersistedState, StateStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed key namespace; the state lives in `<dir>/edsync/state.json`.
const NAMESPACE: &str = "edsync";
const STATE_FILE: &str = "state.json";
/// Temporary file for atomic state writes.
const STATE_TEMP: &str = "state.json.tmp";

/// A state store persisted as a single JSON document.
///
/// Writes go through a temporary file followed by a rename, so a crash
/// mid-write leaves the previous state intact.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl FileStateStore {
    /// Opens (or creates) the state store under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace directory cannot be created or an
    /// existing state file cannot be read or parsed.
    pub fn open(base_dir: &Path) -> StoreResult<Self> {
        let dir = base_dir.join(NAMESPACE);
        fs::create_dir_all(&dir)?;
        if !dir.is_dir() {
            return Err(StoreError::InvalidPath(dir.display().to_string()));
        }

        let path = dir.join(STATE_FILE);
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            PersistedState::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns the path of the backing state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &PersistedState) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(state)?;
        let temp = self.path.with_file_name(STATE_TEMP);
        fs::write(&temp, raw)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_update
    }

    fn baseline(&self) -> (Option<DateTime<Utc>>, Option<String>) {
        let state = self.state.lock();
        (state.last_update, state.checksum.clone())
    }

    fn set_baseline(
        &self,
        last_update: Option<DateTime<Utc>>,
        checksum: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.last_update = last_update;
        state.checksum = checksum;
        self.persist(&state)
    }

    fn auth_token(&self) -> Option<String> {
        self.state.lock().auth_token.clone()
    }

    fn set_auth_token(&self, token: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.auth_token = Some(token.to_string());
        self.persist(&state)
    }

    fn clear_auth_token(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.auth_token = None;
        self.persist(&state)
    }
}
