//! The sync orchestrator.
//!
//! Drives one classify-then-apply pass per cycle, serializes cycles
//! behind a single lock, and re-triggers itself on a periodic timer.

use crate::classify::Classifier;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::gateway::{Authenticator, SettingsGateway};
use crate::host::EditorHost;
use crate::http::HttpClient;
use crate::notify::Notifier;
use crate::settings::SettingsManager;
use chrono::Utc;
use edsync_protocol::{ChangeKind, ChangeRecord, PackageDescriptor, SettingsFiles};
use edsync_store::StateStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Notification shown after a cycle that applied at least one change.
pub const SYNC_SUCCESS_MESSAGE: &str = "Packages synced successfully";

struct TimerHandle {
    stop: Arc<AtomicBool>,
}

/// Orchestrates sync cycles between the local editor and the server.
///
/// `sync()` is safe to call concurrently: a cycle already in flight
/// absorbs further calls as no-ops. Errors never escape `sync()`; a
/// failed cycle is retried on the next timer tick.
pub struct SyncOrchestrator<H, C, A>
where
    H: EditorHost + 'static,
    C: HttpClient + 'static,
    A: Authenticator + 'static,
{
    config: SyncConfig,
    gateway: SettingsGateway<C, A>,
    manager: SettingsManager<H>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    sync_lock: AtomicBool,
    timer: Mutex<Option<TimerHandle>>,
    // Handed to the timer thread so ticks can re-enter sync().
    self_ref: Weak<Self>,
}

impl<H, C, A> SyncOrchestrator<H, C, A>
where
    H: EditorHost + 'static,
    C: HttpClient + 'static,
    A: Authenticator + 'static,
{
    /// Creates an orchestrator.
    pub fn new(
        config: SyncConfig,
        gateway: SettingsGateway<C, A>,
        manager: SettingsManager<H>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            gateway,
            manager,
            store,
            notifier,
            sync_lock: AtomicBool::new(false),
            timer: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote gateway.
    pub fn gateway(&self) -> &SettingsGateway<C, A> {
        &self.gateway
    }

    /// Returns the settings manager.
    pub fn manager(&self) -> &SettingsManager<H> {
        &self.manager
    }

    /// Runs one sync cycle.
    ///
    /// A cycle already in flight makes this a no-op. All errors are
    /// swallowed here: the cycle is best-effort and the periodic timer
    /// will try again. The lock is released on every path.
    pub fn sync(&self) {
        if self
            .sync_lock
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync already in progress, skipping");
            return;
        }

        match self.run_cycle() {
            Ok(0) => tracing::debug!("sync cycle found nothing to do"),
            Ok(applied) => {
                tracing::info!(applied, "sync cycle applied changes");
                self.notifier.success(SYNC_SUCCESS_MESSAGE);
            }
            Err(err) if err.is_quiet() => {
                tracing::debug!(error = %err, "sync cycle stopped by user")
            }
            Err(err) => {
                tracing::warn!(error = %err, "sync cycle failed, will retry on next tick")
            }
        }

        self.sync_lock.store(false, Ordering::SeqCst);
        self.start_auto_sync();
    }

    /// Classifies and applies changes; returns how many were applied.
    fn run_cycle(&self) -> SyncResult<usize> {
        let remote = self.gateway.fetch_info()?;
        let (local, _checksum) = self.store.baseline();

        let classifier = Classifier::new(&self.gateway, &self.manager);
        let changes = classifier.classify(local, &remote)?;

        if !changes.is_empty() {
            let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
            tracing::info!(?kinds, "classified changes");
        }

        let applied = changes.len();
        for change in changes {
            self.apply_change(change)?;
        }
        Ok(applied)
    }

    /// Dispatches one change to its handler.
    ///
    /// Changes are applied strictly in classifier order; the first
    /// handler failure aborts the rest of the cycle.
    fn apply_change(&self, change: ChangeRecord) -> SyncResult<()> {
        match change.kind {
            ChangeKind::FirstTimeConnect
            | ChangeKind::AddPackagesFromClient
            | ChangeKind::RemovePackagesFromClient
            | ChangeKind::SettingsChangedFromClient => self.backup(),

            ChangeKind::AddPackagesFromServer => self.install_packages(&change.packages),

            ChangeKind::RemovePackagesFromServer => self.uninstall_packages(&change.removed),

            ChangeKind::PackageSettingsChangedFromServer => {
                self.apply_settings_files(&change.settings_files)
            }

            // Settings may reference packages, so installs come first;
            // the closing backup reconciles the server with whatever the
            // fresh instance ended up with.
            ChangeKind::NewEditorInstance => {
                self.install_packages(&change.packages)?;
                self.apply_settings_files(&change.settings_files)?;
                self.backup()
            }
        }
    }

    /// Pushes the local snapshot to the server and adopts the returned
    /// timestamp as the new baseline.
    fn backup(&self) -> SyncResult<()> {
        let snapshot = self.manager.build_snapshot(&self.config.preferences)?;
        let outcome = self.gateway.save_snapshot(&snapshot)?;

        if outcome.success {
            if let Some(at) = outcome.last_update {
                self.manager.set_baseline(&self.config.preferences, at)?;
            }
        } else {
            tracing::warn!("server did not accept the snapshot");
        }
        Ok(())
    }

    fn install_packages(&self, packages: &[PackageDescriptor]) -> SyncResult<()> {
        self.manager
            .install_missing(packages, self.config.install_concurrency)?;
        self.refresh_baseline()
    }

    fn uninstall_packages(&self, names: &[String]) -> SyncResult<()> {
        self.manager.uninstall(names)?;
        self.refresh_baseline()
    }

    fn apply_settings_files(&self, files: &SettingsFiles) -> SyncResult<()> {
        self.manager.apply_settings_files(files)?;
        self.refresh_baseline()
    }

    /// Adopts the server's current timestamp as the client baseline so
    /// the next classification pass does not re-detect the change just
    /// applied.
    fn refresh_baseline(&self) -> SyncResult<()> {
        let info = self.gateway.fetch_info()?;
        if let Some(at) = info.last_update {
            self.manager.set_baseline(&self.config.preferences, at)?;
        }
        Ok(())
    }

    /// Advances the client baseline when local settings were edited.
    ///
    /// Runs on the timer tick, before the sync cycle, and only when a
    /// baseline exists, no cycle is in flight, and the snapshot checksum
    /// actually moved.
    pub fn poll_client_changes(&self) {
        if self.sync_lock.load(Ordering::SeqCst) {
            return;
        }

        let prefs = &self.config.preferences;
        let result = (|| -> SyncResult<()> {
            if self.store.last_update().is_some() && self.manager.settings_changed(prefs)? {
                tracing::debug!("local settings changed, advancing client baseline");
                self.manager.set_baseline(prefs, Utc::now())?;
            }
            Ok(())
        })();

        if let Err(err) = result {
            tracing::warn!(error = %err, "client change check failed");
        }
    }

    /// Starts the periodic sync timer; a second start is a no-op.
    pub fn start_auto_sync(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let weak = self.self_ref.clone();
        let interval = self.config.sync_interval;

        std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                // The orchestrator may be gone; the timer dies with it.
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                orchestrator.poll_client_changes();
                orchestrator.sync();
            }
        });

        *timer = Some(TimerHandle { stop });
    }

    /// Stops the periodic timer. An in-flight cycle is not cancelled;
    /// only future ticks are.
    pub fn stop_auto_sync(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.stop.store(true, Ordering::SeqCst);
        }
    }

    /// Returns true while the periodic timer is running.
    pub fn auto_sync_running(&self) -> bool {
        self.timer.lock().is_some()
    }
}

impl<H, C, A> Drop for SyncOrchestrator<H, C, A>
where
    H: EditorHost + 'static,
    C: HttpClient + 'static,
    A: Authenticator + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.stop.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::gateway::StaticAuthenticator;
    use crate::host::MemoryHost;
    use crate::http::{LoopbackClient, LoopbackServer};
    use crate::notify::MemoryNotifier;
    use chrono::{DateTime, TimeZone};
    use edsync_protocol::{SettingsInfo, SettingsSnapshot};
    use edsync_store::MemoryStateStore;
    use parking_lot::RwLock;
    use std::sync::atomic::AtomicU32;

    /// A minimal in-memory settings service.
    #[derive(Default)]
    struct MemoryService {
        snapshot: RwLock<Option<SettingsSnapshot>>,
        last_update: RwLock<Option<DateTime<Utc>>>,
        next_update: RwLock<Option<DateTime<Utc>>>,
        save_count: AtomicU32,
        info_count: AtomicU32,
        /// Fail info fetches once this many have succeeded.
        info_limit: RwLock<Option<u32>>,
    }

    impl MemoryService {
        fn new() -> Self {
            Self::default()
        }

        fn seed(&self, snapshot: SettingsSnapshot, at: DateTime<Utc>) {
            *self.snapshot.write() = Some(snapshot);
            *self.last_update.write() = Some(at);
        }

        fn set_next_update(&self, at: DateTime<Utc>) {
            *self.next_update.write() = Some(at);
        }

        fn fail_info_after(&self, successes: u32) {
            *self.info_limit.write() = Some(successes);
        }
    }

    impl LoopbackServer for Arc<MemoryService> {
        fn handle_get(&self, path: &str) -> Result<Vec<u8>, String> {
            if path.starts_with("/package-sync/lastUpdate") {
                let served = self.info_count.fetch_add(1, Ordering::SeqCst);
                if let Some(limit) = *self.info_limit.read() {
                    if served >= limit {
                        return Err("info endpoint down".into());
                    }
                }
                let info = SettingsInfo {
                    checksum: self.last_update.read().is_some().then(|| "srv".to_string()),
                    last_update: *self.last_update.read(),
                };
                return serde_json::to_vec(&info).map_err(|e| e.to_string());
            }
            if path.starts_with("/package-sync/settings") {
                let snapshot = self.snapshot.read().clone().unwrap_or_default();
                return serde_json::to_vec(&snapshot).map_err(|e| e.to_string());
            }
            Err(format!("unexpected GET {}", path))
        }

        fn handle_post(&self, path: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, String> {
            if path != "/package-sync/settings" {
                return Err(format!("unexpected POST {}", path));
            }
            let settings = fields
                .iter()
                .find(|(k, _)| *k == "settings")
                .map(|(_, v)| *v)
                .ok_or("missing settings field")?;
            let snapshot: SettingsSnapshot =
                serde_json::from_str(settings).map_err(|e| e.to_string())?;

            let at = (*self.next_update.read())
                .unwrap_or_else(|| Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
            *self.snapshot.write() = Some(snapshot);
            *self.last_update.write() = Some(at);
            self.save_count.fetch_add(1, Ordering::SeqCst);

            let outcome = edsync_protocol::SaveOutcome {
                success: true,
                last_update: Some(at),
            };
            serde_json::to_vec(&outcome).map_err(|e| e.to_string())
        }
    }

    type TestOrchestrator =
        SyncOrchestrator<MemoryHost, LoopbackClient<Arc<MemoryService>>, StaticAuthenticator>;

    struct Fixture {
        service: Arc<MemoryService>,
        host: Arc<MemoryHost>,
        store: Arc<MemoryStateStore>,
        notifier: Arc<MemoryNotifier>,
        orchestrator: Arc<TestOrchestrator>,
    }

    fn fixture() -> Fixture {
        let service = Arc::new(MemoryService::new());
        let host = Arc::new(MemoryHost::new());
        let store = Arc::new(MemoryStateStore::new());
        store.set_auth_token("tok").unwrap();
        let notifier = Arc::new(MemoryNotifier::new());

        let gateway = SettingsGateway::new(
            "https://settings.example.com",
            LoopbackClient::new(Arc::clone(&service)),
            StaticAuthenticator::new("provider"),
            Arc::clone(&store) as Arc<dyn StateStore>,
        )
        .with_retry(RetryConfig::no_retry())
        .with_cache_ttl(std::time::Duration::ZERO);
        let manager = SettingsManager::new(
            Arc::clone(&host),
            Arc::clone(&store) as Arc<dyn StateStore>,
        );

        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new("https://settings.example.com"),
            gateway,
            manager,
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        Fixture {
            service,
            host,
            store,
            notifier,
            orchestrator,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn first_time_connect_seeds_the_server() {
        let f = fixture();
        f.service.set_next_update(at(1));

        f.orchestrator.sync();

        assert_eq!(f.service.save_count.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.last_update(), Some(at(1)));
        assert_eq!(f.notifier.messages(), vec![SYNC_SUCCESS_MESSAGE]);
        assert!(f.orchestrator.auto_sync_running());
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn cycle_after_backup_is_a_noop() {
        let f = fixture();
        f.service.set_next_update(at(1));

        f.orchestrator.sync();
        f.orchestrator.sync();

        // Second cycle classified nothing: no extra save, no second toast.
        assert_eq!(f.service.save_count.load(Ordering::SeqCst), 1);
        assert_eq!(f.notifier.messages().len(), 1);
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn new_editor_instance_installs_applies_then_backs_up() {
        let f = fixture();
        let mut files = SettingsFiles::new();
        files.insert(
            "packages.json".into(),
            edsync_protocol::FileEntry::new(r#"[{"name":"linter"},{"name":"minimap"}]"#),
        );
        files.insert(
            "settings.json".into(),
            edsync_protocol::FileEntry::new(r#"{"editor":{"fontSize":11}}"#),
        );
        f.service.seed(SettingsSnapshot::new(files), at(2));
        f.service.set_next_update(at(3));

        f.orchestrator.sync();

        assert!(f.host.is_installed("linter"));
        assert!(f.host.is_installed("minimap"));
        assert_eq!(f.host.settings().unwrap()["editor"]["fontSize"], 11);
        // The closing backup stamped the server's new timestamp.
        assert_eq!(f.service.save_count.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.last_update(), Some(at(3)));
        assert_eq!(f.notifier.messages().len(), 1);
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn handler_failure_aborts_remaining_changes() {
        let f = fixture();
        let mut files = SettingsFiles::new();
        files.insert(
            "packages.json".into(),
            edsync_protocol::FileEntry::new(r#"[{"name":"linter"}]"#),
        );
        // Malformed settings blob: the apply handler fails after installs.
        files.insert(
            "settings.json".into(),
            edsync_protocol::FileEntry::new("{broken"),
        );
        f.service.seed(SettingsSnapshot::new(files), at(2));

        f.orchestrator.sync();

        // Install ran, the closing backup never did.
        assert!(f.host.is_installed("linter"));
        assert_eq!(f.service.save_count.load(Ordering::SeqCst), 0);
        assert!(f.notifier.messages().is_empty());
        // Lock was released: a later cycle may run again.
        assert!(!f.orchestrator.sync_lock.load(Ordering::SeqCst));
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn failed_install_handler_skips_settings_and_backup() {
        let f = fixture();
        let mut files = SettingsFiles::new();
        files.insert(
            "packages.json".into(),
            edsync_protocol::FileEntry::new(r#"[{"name":"linter"}]"#),
        );
        files.insert(
            "settings.json".into(),
            edsync_protocol::FileEntry::new(r#"{"editor":{"fontSize":9}}"#),
        );
        f.service.seed(SettingsSnapshot::new(files), at(2));
        // Classification sees the server once; the install handler's
        // re-baseline fetch then fails, rejecting the whole handler.
        f.service.fail_info_after(1);

        f.orchestrator.sync();

        assert!(f.host.settings().unwrap().get("editor").is_none());
        assert_eq!(f.service.save_count.load(Ordering::SeqCst), 0);
        assert!(f.notifier.messages().is_empty());
        assert!(!f.orchestrator.sync_lock.load(Ordering::SeqCst));
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn concurrent_sync_is_absorbed() {
        let f = fixture();
        f.orchestrator.sync_lock.store(true, Ordering::SeqCst);

        f.orchestrator.sync();

        // Dropped without classifying: no info fetch happened.
        assert_eq!(f.service.info_count.load(Ordering::SeqCst), 0);
        // And the holder's lock is untouched.
        assert!(f.orchestrator.sync_lock.load(Ordering::SeqCst));
        f.orchestrator.sync_lock.store(false, Ordering::SeqCst);
    }

    #[test]
    fn server_newer_applies_adds_removes_and_settings() {
        let f = fixture();
        f.host.add_package(edsync_protocol::PackageDescriptor::named("obsolete"));
        f.store.set_baseline(Some(at(1)), Some("old".into())).unwrap();

        let mut files = SettingsFiles::new();
        files.insert(
            "packages.json".into(),
            edsync_protocol::FileEntry::new(r#"[{"name":"fresh"}]"#),
        );
        files.insert(
            "settings.json".into(),
            edsync_protocol::FileEntry::new(r#"{"core":{"autoIndent":true}}"#),
        );
        f.service.seed(SettingsSnapshot::new(files), at(5));

        f.orchestrator.sync();

        assert!(f.host.is_installed("fresh"));
        assert!(!f.host.is_installed("obsolete"));
        assert_eq!(f.host.settings().unwrap()["core"]["autoIndent"], true);
        // Baseline adopted the server timestamp that triggered the cycle.
        assert_eq!(f.store.last_update(), Some(at(5)));
        assert_eq!(f.notifier.messages().len(), 1);
        f.orchestrator.stop_auto_sync();
    }

    #[test]
    fn poll_client_changes_requires_baseline_and_drift() {
        let f = fixture();
        let prefs = f.orchestrator.config().preferences.clone();

        // No baseline: nothing happens.
        f.orchestrator.poll_client_changes();
        assert_eq!(f.store.last_update(), None);

        f.orchestrator
            .manager()
            .set_baseline(&prefs, at(1))
            .unwrap();

        // Baseline but no drift: timestamp untouched.
        f.orchestrator.poll_client_changes();
        assert_eq!(f.store.last_update(), Some(at(1)));

        // Drift: timestamp advances.
        f.host.set_settings(serde_json::json!({"editor": {"fontSize": 20}}));
        f.orchestrator.poll_client_changes();
        assert_ne!(f.store.last_update(), Some(at(1)));
    }

    #[test]
    fn poll_client_changes_skips_while_locked() {
        let f = fixture();
        let prefs = f.orchestrator.config().preferences.clone();
        f.orchestrator.manager().set_baseline(&prefs, at(1)).unwrap();
        f.host.set_settings(serde_json::json!({"editor": {"fontSize": 20}}));

        f.orchestrator.sync_lock.store(true, Ordering::SeqCst);
        f.orchestrator.poll_client_changes();
        assert_eq!(f.store.last_update(), Some(at(1)));
        f.orchestrator.sync_lock.store(false, Ordering::SeqCst);
    }

    #[test]
    fn start_auto_sync_is_idempotent() {
        let f = fixture();
        f.orchestrator.start_auto_sync();
        f.orchestrator.start_auto_sync();
        assert!(f.orchestrator.auto_sync_running());

        f.orchestrator.stop_auto_sync();
        assert!(!f.orchestrator.auto_sync_running());
        // Stopping again is also a no-op.
        f.orchestrator.stop_auto_sync();
    }
}
