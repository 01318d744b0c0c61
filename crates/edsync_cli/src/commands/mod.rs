//! CLI command implementations.

pub mod logout;
pub mod status;
pub mod sync;
pub mod watch;

use crate::auth::{ConsoleAuthenticator, ConsoleNotifier};
use crate::http::UreqClient;
use edsync_engine::{
    DirectoryHost, Notifier, SettingsGateway, SettingsManager, SyncConfig, SyncOrchestrator,
};
use edsync_store::{FileStateStore, StateStore};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The orchestrator type the CLI drives.
pub type CliOrchestrator = SyncOrchestrator<DirectoryHost, UreqClient, ConsoleAuthenticator>;

/// Wires a full orchestrator over the given config directory.
pub fn build(
    config_dir: &Path,
    server: &str,
    interval_secs: u64,
) -> Result<(Arc<CliOrchestrator>, Arc<FileStateStore>), Box<dyn Error>> {
    let host = Arc::new(DirectoryHost::open(config_dir)?);
    let store = Arc::new(FileStateStore::open(config_dir)?);
    let config = SyncConfig::new(server).with_sync_interval(Duration::from_secs(interval_secs));

    let gateway = SettingsGateway::new(
        server,
        UreqClient::default(),
        ConsoleAuthenticator::new(server),
        Arc::clone(&store) as Arc<dyn StateStore>,
    )
    .with_retry(config.retry.clone())
    .with_cache_ttl(config.cache_ttl);

    let manager = SettingsManager::new(host, Arc::clone(&store) as Arc<dyn StateStore>);

    let orchestrator = SyncOrchestrator::new(
        config,
        gateway,
        manager,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::new(ConsoleNotifier) as Arc<dyn Notifier>,
    );

    Ok((orchestrator, store))
}
