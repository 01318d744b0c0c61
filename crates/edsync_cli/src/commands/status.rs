//! Sync status command.

use edsync_store::{FileStateStore, StateStore};
use std::error::Error;
use std::path::Path;

/// Prints the local baseline, and the server's info record with `--remote`.
pub fn run(config_dir: &Path, server: &str, remote: bool) -> Result<(), Box<dyn Error>> {
    let store = FileStateStore::open(config_dir)?;
    let (last_update, checksum) = store.baseline();

    println!("config dir:  {}", config_dir.display());
    match last_update {
        Some(at) => println!("last sync:   {}", at.to_rfc3339()),
        None => println!("last sync:   never"),
    }
    match checksum {
        Some(checksum) => println!("checksum:    {}", checksum),
        None => println!("checksum:    none"),
    }
    println!(
        "auth token:  {}",
        if store.auth_token().is_some() {
            "cached"
        } else {
            "not cached"
        }
    );

    if remote {
        let (orchestrator, _store) = super::build(config_dir, server, 60)?;
        let info = orchestrator.gateway().fetch_info()?;
        match info.last_update {
            Some(at) => println!("server sync: {}", at.to_rfc3339()),
            None => println!("server sync: never"),
        }
        if let Some(checksum) = info.checksum {
            println!("server sum:  {}", checksum);
        }
    }

    Ok(())
}
