//! Local settings management.
//!
//! `SettingsManager` assembles the local snapshot (settings blob, keymap,
//! styles, init script, snippets, package list, extra files), computes its
//! checksum, and applies server-side state back onto the host editor.

use crate::config::SyncPreferences;
use crate::error::{SyncError, SyncResult};
use crate::host::EditorHost;
use chrono::{DateTime, Utc};
use edsync_protocol::{
    placeholder_comment, FileEntry, PackageDescriptor, SettingsFiles, SettingsSnapshot, INIT_FILE,
    KEYMAP_FILE, PACKAGES_FILE, SETTINGS_FILE, SNIPPETS_FILE, STYLES_FILE,
};
use edsync_store::StateStore;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Settings files covered by the `sync_settings` preference, excluding
/// the settings blob itself.
const USER_FILES: [&str; 4] = [KEYMAP_FILE, STYLES_FILE, INIT_FILE, SNIPPETS_FILE];

/// Builds, checksums and applies the local configuration snapshot.
pub struct SettingsManager<H: EditorHost> {
    host: Arc<H>,
    store: Arc<dyn StateStore>,
}

impl<H: EditorHost> SettingsManager<H> {
    /// Creates a manager over the given host and state store.
    pub fn new(host: Arc<H>, store: Arc<dyn StateStore>) -> Self {
        Self { host, store }
    }

    /// Returns the host editor.
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Assembles the local settings files per the preferences.
    ///
    /// Missing files never fail; their content is a placeholder comment in
    /// the file's own comment syntax.
    pub fn build_files(&self, prefs: &SyncPreferences) -> SyncResult<SettingsFiles> {
        let mut files = SettingsFiles::new();

        if prefs.sync_settings {
            files.insert(
                SETTINGS_FILE.to_string(),
                FileEntry::new(self.filtered_settings(prefs)?),
            );
            for name in USER_FILES {
                files.insert(name.to_string(), FileEntry::new(self.file_or_placeholder(name)));
            }
        }

        if prefs.sync_packages {
            let packages = self.host.installed_packages()?;
            files.insert(
                PACKAGES_FILE.to_string(),
                FileEntry::new(serde_json::to_string_pretty(&packages)?),
            );
        }

        for name in &prefs.extra_files {
            files.insert(name.clone(), FileEntry::new(self.file_or_placeholder(name)));
        }

        Ok(files)
    }

    /// Assembles the full local snapshot.
    pub fn build_snapshot(&self, prefs: &SyncPreferences) -> SyncResult<SettingsSnapshot> {
        Ok(SettingsSnapshot::new(self.build_files(prefs)?))
    }

    /// Serializes the settings blob with blacklisted key paths removed.
    pub fn filtered_settings(&self, prefs: &SyncPreferences) -> SyncResult<String> {
        let mut settings = self.host.settings()?;
        for key in &prefs.blacklisted_keys {
            let path: Vec<&str> = key.split('.').collect();
            remove_key_path(&mut settings, &path);
        }
        Ok(serde_json::to_string_pretty(&settings)?)
    }

    /// SHA-256 hex digest of the serialized local snapshot.
    ///
    /// The files mapping is ordered, so the digest is independent of the
    /// order files were collected in.
    pub fn checksum(&self, prefs: &SyncPreferences) -> SyncResult<String> {
        let files = self.build_files(prefs)?;
        let serialized = serde_json::to_string(&files)?;
        let digest = Sha256::digest(serialized.as_bytes());
        Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Returns true when a stored checksum exists and differs from the
    /// current one. Returns false when no checksum was ever stored.
    pub fn settings_changed(&self, prefs: &SyncPreferences) -> SyncResult<bool> {
        let (_, stored) = self.store.baseline();
        match stored {
            Some(stored) => Ok(stored != self.checksum(prefs)?),
            None => Ok(false),
        }
    }

    /// Stores `last_update` together with the current snapshot checksum as
    /// the new baseline.
    pub fn set_baseline(
        &self,
        prefs: &SyncPreferences,
        last_update: DateTime<Utc>,
    ) -> SyncResult<()> {
        let checksum = self.checksum(prefs)?;
        self.store.set_baseline(Some(last_update), Some(checksum))?;
        Ok(())
    }

    /// Applies server-side settings files onto the host.
    ///
    /// Recognized logical names are dispatched; unrecognized names are
    /// silently ignored so newer clients can sync extra files past us.
    pub fn apply_settings_files(&self, files: &SettingsFiles) -> SyncResult<()> {
        for (name, entry) in files {
            match name.as_str() {
                SETTINGS_FILE => {
                    let blob: serde_json::Value = serde_json::from_str(&entry.content)
                        .map_err(|e| SyncError::Snapshot(format!("{}: {}", SETTINGS_FILE, e)))?;
                    self.apply_settings_blob("", &blob)?;
                }
                KEYMAP_FILE | STYLES_FILE | INIT_FILE | SNIPPETS_FILE => {
                    self.host
                        .write_file(name, &entry.content)
                        .map_err(|e| SyncError::FileApply {
                            name: name.clone(),
                            reason: e.to_string(),
                        })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Applies a settings blob by walking it and setting each leaf.
    ///
    /// Objects recurse; arrays and scalars are leaves. Color-shaped maps
    /// (keys exactly alpha/blue/green/red) are applied as single leaves.
    pub fn apply_settings_blob(&self, prefix: &str, blob: &serde_json::Value) -> SyncResult<()> {
        let Some(map) = blob.as_object() else {
            return Ok(());
        };

        for (key, value) in map {
            let key_path = format!("{}.{}", prefix, key);
            if value.is_object() && !is_color(value) {
                self.apply_settings_blob(&key_path, value)?;
            } else {
                self.host
                    .set_setting(key_path.trim_start_matches('.'), value)?;
            }
        }
        Ok(())
    }

    /// Installs every package not already present, at most `limit` at a time.
    ///
    /// Individual install failures are logged and do not abort the batch.
    pub fn install_missing(&self, packages: &[PackageDescriptor], limit: usize) -> SyncResult<()> {
        let missing: Vec<_> = packages
            .iter()
            .filter(|p| !self.host.is_installed(&p.name))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let workers = limit.max(1).min(missing.len());
        let queue = Mutex::new(missing.into_iter());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let Some(package) = queue.lock().next() else {
                        break;
                    };
                    tracing::info!(
                        name = %package.name,
                        kind = package.kind_label(),
                        "installing"
                    );
                    if let Err(err) = self.host.install(package) {
                        tracing::warn!(
                            name = %package.name,
                            error = %err,
                            "install failed"
                        );
                    }
                });
            }
        });

        Ok(())
    }

    /// Uninstalls packages sequentially; per-item failures are logged and
    /// the loop continues.
    pub fn uninstall(&self, names: &[String]) -> SyncResult<()> {
        for name in names {
            if let Err(err) = self.host.uninstall(name) {
                tracing::warn!(name = %name, error = %err, "uninstall failed");
            }
        }
        Ok(())
    }

    fn file_or_placeholder(&self, name: &str) -> String {
        self.host
            .file_content(name)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| placeholder_comment(name))
    }
}

/// Removes a dot-separated key path from a settings blob in place.
///
/// Removing a missing path is a no-op. A non-object midway through the
/// path is deleted wholesale, matching the snapshot filter semantics.
fn remove_key_path(value: &mut serde_json::Value, path: &[&str]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Some(map) = value.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        map.remove(*head);
        return;
    }

    match map.get_mut(*head) {
        Some(child) if child.is_object() => remove_key_path(child, rest),
        Some(_) => {
            map.remove(*head);
        }
        None => {}
    }
}

/// True for maps whose keys are exactly alpha/blue/green/red: the host
/// stores colors as one value, not as four nested settings.
fn is_color(value: &serde_json::Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys == ["alpha", "blue", "green", "red"]
}
