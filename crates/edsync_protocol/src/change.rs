//! Reconciliation change records.

use crate::files::SettingsFiles;
use crate::package::PackageDescriptor;
use chrono::{DateTime, Utc};

/// The kind of divergence a change record describes.
///
/// `AddPackagesFromClient` and `RemovePackagesFromClient` are reserved:
/// the classifier currently folds all client-side divergence into
/// `SettingsChangedFromClient`, but the kinds stay in the dispatch table
/// so per-kind client classification can ship without a protocol change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Neither client nor server has ever synced.
    FirstTimeConnect,
    /// The client has never synced but the server holds data.
    NewEditorInstance,
    /// Packages were added on another editor instance.
    AddPackagesFromServer,
    /// Packages were removed on another editor instance.
    RemovePackagesFromServer,
    /// Package settings changed on another editor instance.
    PackageSettingsChangedFromServer,
    /// Any change on this editor instance.
    SettingsChangedFromClient,
    /// Reserved: packages added on this editor instance.
    AddPackagesFromClient,
    /// Reserved: packages removed on this editor instance.
    RemovePackagesFromClient,
}

/// One typed reconciliation instruction.
///
/// The `kind` determines which payload fields are populated; the
/// constructors below are the only way records are built, so each kind
/// carries exactly one payload shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// What diverged.
    pub kind: ChangeKind,
    /// Packages to install (`AddPackagesFromServer`, `NewEditorInstance`).
    pub packages: Vec<PackageDescriptor>,
    /// Package names to uninstall (`RemovePackagesFromServer`).
    pub removed: Vec<String>,
    /// Settings files to apply (`PackageSettingsChangedFromServer`,
    /// `NewEditorInstance`).
    pub settings_files: SettingsFiles,
    /// Server timestamp of the remote state this change reflects.
    pub remote_update: Option<DateTime<Utc>>,
}

impl ChangeRecord {
    fn bare(kind: ChangeKind) -> Self {
        Self {
            kind,
            packages: Vec::new(),
            removed: Vec::new(),
            settings_files: SettingsFiles::new(),
            remote_update: None,
        }
    }

    /// First sync ever: seed the server from the local state.
    pub fn first_time_connect() -> Self {
        Self::bare(ChangeKind::FirstTimeConnect)
    }

    /// Fresh editor instance: pull everything from the server.
    pub fn new_editor_instance(
        packages: Vec<PackageDescriptor>,
        settings_files: SettingsFiles,
        remote_update: DateTime<Utc>,
    ) -> Self {
        Self {
            packages,
            settings_files,
            remote_update: Some(remote_update),
            ..Self::bare(ChangeKind::NewEditorInstance)
        }
    }

    /// Packages added on another instance.
    pub fn add_packages_from_server(
        packages: Vec<PackageDescriptor>,
        remote_update: DateTime<Utc>,
    ) -> Self {
        Self {
            packages,
            remote_update: Some(remote_update),
            ..Self::bare(ChangeKind::AddPackagesFromServer)
        }
    }

    /// Packages removed on another instance.
    pub fn remove_packages_from_server(
        removed: Vec<String>,
        remote_update: DateTime<Utc>,
    ) -> Self {
        Self {
            removed,
            remote_update: Some(remote_update),
            ..Self::bare(ChangeKind::RemovePackagesFromServer)
        }
    }

    /// Settings files changed on another instance.
    pub fn package_settings_changed(
        settings_files: SettingsFiles,
        remote_update: DateTime<Utc>,
    ) -> Self {
        Self {
            settings_files,
            remote_update: Some(remote_update),
            ..Self::bare(ChangeKind::PackageSettingsChangedFromServer)
        }
    }

    /// The client is ahead of the server.
    pub fn settings_changed_from_client() -> Self {
        Self::bare(ChangeKind::SettingsChangedFromClient)
    }
}
