//! Change classification.
//!
//! Compares the client's last sync timestamp against the server's info
//! record and produces the ordered list of change records one sync cycle
//! must apply.

use crate::error::{SyncError, SyncResult};
use crate::gateway::{Authenticator, SettingsGateway};
use crate::host::EditorHost;
use crate::http::HttpClient;
use crate::settings::SettingsManager;
use chrono::{DateTime, Utc};
use edsync_protocol::{
    ChangeRecord, PackageDescriptor, PackageDiff, SettingsInfo, SettingsSnapshot, PACKAGES_FILE,
};

/// Classifies client/server divergence into change records.
pub struct Classifier<'a, H, C, A>
where
    H: EditorHost,
    C: HttpClient,
    A: Authenticator,
{
    gateway: &'a SettingsGateway<C, A>,
    manager: &'a SettingsManager<H>,
}

impl<'a, H, C, A> Classifier<'a, H, C, A>
where
    H: EditorHost,
    C: HttpClient,
    A: Authenticator,
{
    /// Creates a classifier over the gateway and settings manager.
    pub fn new(gateway: &'a SettingsGateway<C, A>, manager: &'a SettingsManager<H>) -> Self {
        Self { gateway, manager }
    }

    /// Produces the ordered changes between the local baseline and the
    /// server state described by `remote`.
    ///
    /// The decision is an exhaustive case split on which side has a
    /// timestamp and how they compare. A fetch failure aborts
    /// classification; `AuthWindowClosed` stays quiet at the call site.
    ///
    /// When the client holds a baseline but the server reports none (the
    /// server was reset), the divergence is classified as
    /// `SettingsChangedFromClient` so the apply pass re-seeds the server.
    pub fn classify(
        &self,
        local: Option<DateTime<Utc>>,
        remote: &SettingsInfo,
    ) -> SyncResult<Vec<ChangeRecord>> {
        match (local, remote.last_update) {
            (None, None) => Ok(vec![ChangeRecord::first_time_connect()]),

            (None, Some(remote_update)) => {
                let snapshot = self.gateway.fetch_snapshot()?;
                let packages = parse_remote_packages(&snapshot)?;
                Ok(vec![ChangeRecord::new_editor_instance(
                    packages,
                    snapshot.files,
                    remote_update,
                )])
            }

            (Some(local_update), Some(remote_update)) if remote_update > local_update => {
                let snapshot = self.gateway.fetch_snapshot()?;
                let local_packages = self.manager.host().installed_packages()?;
                let remote_packages = parse_remote_packages(&snapshot)?;
                let diff = diff_packages(&local_packages, &remote_packages);

                let mut changes = Vec::new();
                if !diff.added.is_empty() {
                    changes.push(ChangeRecord::add_packages_from_server(
                        diff.added,
                        remote_update,
                    ));
                }
                if !diff.removed.is_empty() {
                    changes.push(ChangeRecord::remove_packages_from_server(
                        diff.removed,
                        remote_update,
                    ));
                }
                changes.push(ChangeRecord::package_settings_changed(
                    snapshot.files,
                    remote_update,
                ));
                Ok(changes)
            }

            (Some(local_update), Some(remote_update)) if local_update > remote_update => {
                // The snapshot is not consulted yet, but a fetch failure
                // still aborts the cycle before any backup overwrites
                // server state.
                let _ = self.gateway.fetch_snapshot()?;
                Ok(vec![ChangeRecord::settings_changed_from_client()])
            }

            // Timestamps equal: in sync, nothing to do.
            (Some(_), Some(_)) => Ok(Vec::new()),

            (Some(_), None) => Ok(vec![ChangeRecord::settings_changed_from_client()]),
        }
    }
}

/// Computes the package diff between two sets; identity is name-only.
///
/// The removal scan runs only when the set sizes do not reconcile under
/// pure addition; with name-unique sets the two conditions coincide, so
/// the short-circuit is purely an optimization.
pub fn diff_packages(old: &[PackageDescriptor], new: &[PackageDescriptor]) -> PackageDiff {
    let mut diff = PackageDiff::default();

    for candidate in new {
        if !old.iter().any(|p| p.name == candidate.name) {
            diff.added.push(candidate.clone());
        }
    }

    if old.len() + diff.added.len() != new.len() {
        for candidate in old {
            if !new.iter().any(|p| p.name == candidate.name) {
                diff.removed.push(candidate.name.clone());
            }
        }
    }

    diff
}

fn parse_remote_packages(snapshot: &SettingsSnapshot) -> SyncResult<Vec<PackageDescriptor>> {
    snapshot
        .packages()
        .map_err(|e| SyncError::Snapshot(format!("{}: {}", PACKAGES_FILE, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::gateway::StaticAuthenticator;
    use crate::host::MemoryHost;
    use crate::http::{LoopbackClient, LoopbackServer};
    use chrono::TimeZone;
    use edsync_protocol::ChangeKind;
    use edsync_store::{MemoryStateStore, StateStore};
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Serves a fixed snapshot body; counts fetches.
    struct SnapshotService {
        snapshot_body: RwLock<String>,
        snapshot_calls: AtomicU32,
        fail_snapshot: RwLock<bool>,
    }

    impl SnapshotService {
        fn new(snapshot_body: &str) -> Self {
            Self {
                snapshot_body: RwLock::new(snapshot_body.to_string()),
                snapshot_calls: AtomicU32::new(0),
                fail_snapshot: RwLock::new(false),
            }
        }
    }

    impl LoopbackServer for Arc<SnapshotService> {
        fn handle_get(&self, path: &str) -> Result<Vec<u8>, String> {
            if path.starts_with("/package-sync/settings") {
                self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
                if *self.fail_snapshot.read() {
                    return Err("connection reset".into());
                }
                return Ok(self.snapshot_body.read().clone().into_bytes());
            }
            Ok(b"{}".to_vec())
        }

        fn handle_post(&self, _path: &str, _fields: &[(&str, &str)]) -> Result<Vec<u8>, String> {
            Ok(b"{}".to_vec())
        }
    }

    struct Fixture {
        service: Arc<SnapshotService>,
        host: Arc<MemoryHost>,
        gateway: SettingsGateway<LoopbackClient<Arc<SnapshotService>>, StaticAuthenticator>,
        manager: SettingsManager<MemoryHost>,
    }

    fn fixture(snapshot_body: &str) -> Fixture {
        let service = Arc::new(SnapshotService::new(snapshot_body));
        let host = Arc::new(MemoryHost::new());
        let store = Arc::new(MemoryStateStore::new());
        store.set_auth_token("tok").unwrap();
        let gateway = SettingsGateway::new(
            "https://settings.example.com",
            LoopbackClient::new(Arc::clone(&service)),
            StaticAuthenticator::new("provider"),
            Arc::clone(&store) as Arc<dyn StateStore>,
        )
        .with_retry(RetryConfig::no_retry());
        let manager =
            SettingsManager::new(Arc::clone(&host), store as Arc<dyn StateStore>);
        Fixture {
            service,
            host,
            gateway,
            manager,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    const SNAPSHOT_BC: &str = r#"{"files":{
        "packages.json":{"content":"[{\"name\":\"b\"},{\"name\":\"c\"}]"},
        "settings.json":{"content":"{\"editor\":{\"fontSize\":14}}"}
    }}"#;

    #[test]
    fn both_absent_is_first_time_connect() {
        let f = fixture(SNAPSHOT_BC);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier.classify(None, &SettingsInfo::empty()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::FirstTimeConnect);
        // No snapshot needed to decide this.
        assert_eq!(f.service.snapshot_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn local_absent_remote_present_is_new_editor_instance() {
        let f = fixture(SNAPSHOT_BC);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let remote = SettingsInfo::new("abc", at(1));
        let changes = classifier.classify(None, &remote).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::NewEditorInstance);
        assert_eq!(changes[0].remote_update, Some(at(1)));
        let names: Vec<&str> = changes[0].packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(changes[0].settings_files.contains_key("settings.json"));
    }

    #[test]
    fn server_newer_emits_adds_removes_and_settings() {
        let f = fixture(SNAPSHOT_BC);
        f.host.add_package(PackageDescriptor::named("a"));
        f.host.add_package(PackageDescriptor::named("b"));

        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier
            .classify(Some(at(1)), &SettingsInfo::new("abc", at(2)))
            .unwrap();

        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].kind, ChangeKind::AddPackagesFromServer);
        assert_eq!(changes[0].packages[0].name, "c");
        assert_eq!(changes[1].kind, ChangeKind::RemovePackagesFromServer);
        assert_eq!(changes[1].removed, vec!["a".to_string()]);
        assert_eq!(changes[2].kind, ChangeKind::PackageSettingsChangedFromServer);
        assert!(changes[2].settings_files.contains_key("settings.json"));
        for change in &changes {
            assert_eq!(change.remote_update, Some(at(2)));
        }
    }

    #[test]
    fn server_newer_without_package_diff_emits_settings_only() {
        let f = fixture(SNAPSHOT_BC);
        f.host.add_package(PackageDescriptor::named("b"));
        f.host.add_package(PackageDescriptor::named("c"));

        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier
            .classify(Some(at(1)), &SettingsInfo::new("abc", at(2)))
            .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::PackageSettingsChangedFromServer);
    }

    #[test]
    fn client_newer_emits_settings_changed_from_client() {
        let f = fixture(SNAPSHOT_BC);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier
            .classify(Some(at(2)), &SettingsInfo::new("abc", at(1)))
            .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::SettingsChangedFromClient);
        // The branch still validates the snapshot fetch.
        assert_eq!(f.service.snapshot_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn equal_timestamps_emit_nothing() {
        let f = fixture(SNAPSHOT_BC);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier
            .classify(Some(at(3)), &SettingsInfo::new("abc", at(3)))
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(f.service.snapshot_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_reset_reseeds_from_client() {
        let f = fixture(SNAPSHOT_BC);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let changes = classifier
            .classify(Some(at(3)), &SettingsInfo::empty())
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::SettingsChangedFromClient);
        assert_eq!(f.service.snapshot_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshot_fetch_failure_aborts_classification() {
        let f = fixture(SNAPSHOT_BC);
        *f.service.fail_snapshot.write() = true;
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let result = classifier.classify(None, &SettingsInfo::new("abc", at(1)));
        assert!(matches!(result, Err(SyncError::Transport { .. })));
    }

    #[test]
    fn malformed_remote_packages_is_classification_error() {
        let f = fixture(r#"{"files":{"packages.json":{"content":"not json"}}}"#);
        let classifier = Classifier::new(&f.gateway, &f.manager);
        let result = classifier.classify(None, &SettingsInfo::new("abc", at(1)));
        assert!(matches!(result, Err(SyncError::Snapshot(_))));
    }

    #[test]
    fn diff_identical_sets_is_empty() {
        let set = vec![
            PackageDescriptor::named("a"),
            PackageDescriptor::named("b"),
        ];
        assert!(diff_packages(&set, &set).is_empty());
    }

    #[test]
    fn diff_ignores_versions() {
        let old = vec![PackageDescriptor::named("a").with_version("1.0.0")];
        let new = vec![PackageDescriptor::named("a").with_version("2.0.0")];
        assert!(diff_packages(&old, &new).is_empty());
    }

    #[test]
    fn diff_added_and_removed() {
        let old = vec![
            PackageDescriptor::named("a"),
            PackageDescriptor::named("b"),
        ];
        let new = vec![
            PackageDescriptor::named("b"),
            PackageDescriptor::named("c"),
        ];
        let diff = diff_packages(&old, &new);
        assert_eq!(diff.added, vec![PackageDescriptor::named("c")]);
        assert_eq!(diff.removed, vec!["a".to_string()]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn package_set() -> impl Strategy<Value = Vec<PackageDescriptor>> {
            proptest::collection::btree_set("[a-e]{1,3}", 0..8).prop_map(|names| {
                names.into_iter().map(PackageDescriptor::named).collect()
            })
        }

        proptest! {
            #[test]
            fn diff_of_identical_sets_is_empty(set in package_set()) {
                prop_assert!(diff_packages(&set, &set).is_empty());
            }

            #[test]
            fn diff_partitions_the_sets(old in package_set(), new in package_set()) {
                let diff = diff_packages(&old, &new);

                // Every added package is in new and not in old.
                for added in &diff.added {
                    prop_assert!(new.iter().any(|p| p.name == added.name));
                    prop_assert!(!old.iter().any(|p| p.name == added.name));
                }
                // Every removed name is in old and not in new.
                for removed in &diff.removed {
                    prop_assert!(old.iter().any(|p| &p.name == removed));
                    prop_assert!(!new.iter().any(|p| &p.name == removed));
                }
                // Cardinality reconciles.
                prop_assert_eq!(
                    old.len() + diff.added.len() - diff.removed.len(),
                    new.len()
                );
            }
        }
    }
}
