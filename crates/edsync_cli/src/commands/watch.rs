//! Foreground periodic sync loop.

use edsync_engine::ProcessLock;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Runs the periodic sync loop until interrupted.
///
/// Only one process per config directory gets to be the runner; later
/// invocations exit immediately instead of double-syncing.
pub fn run(config_dir: &Path, server: &str, interval: u64) -> Result<(), Box<dyn Error>> {
    let lock_dir = config_dir.join("edsync");
    let Some(_lock) = ProcessLock::acquire(&lock_dir)? else {
        println!("another edsync process is already watching this directory");
        return Ok(());
    };

    let (orchestrator, _store) = super::build(config_dir, server, interval)?;

    info!(interval, "starting watch loop");
    // The first cycle also starts the periodic timer.
    orchestrator.sync();

    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
