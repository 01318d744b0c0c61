//! Logout command.

use edsync_store::{FileStateStore, StateStore};
use std::error::Error;
use std::path::Path;

/// Forgets the cached auth token; the next sync re-authenticates.
pub fn run(config_dir: &Path) -> Result<(), Box<dyn Error>> {
    let store = FileStateStore::open(config_dir)?;
    if store.auth_token().is_some() {
        store.clear_auth_token()?;
        println!("auth token cleared");
    } else {
        println!("no auth token cached");
    }
    Ok(())
}
