//! One-shot sync command.

use std::error::Error;
use std::path::Path;

/// Runs a single sync cycle and stops the timer it leaves behind.
pub fn run(config_dir: &Path, server: &str) -> Result<(), Box<dyn Error>> {
    let (orchestrator, _store) = super::build(config_dir, server, 60)?;

    orchestrator.sync();
    orchestrator.stop_auto_sync();

    Ok(())
}
