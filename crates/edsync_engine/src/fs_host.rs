//! Directory-backed editor host.
//!
//! Adapts a plain configuration directory to the [`EditorHost`] seam:
//! the settings blob lives in `config.json`, user files (keymap, styles,
//! snippets, extras) are ordinary files in the directory, and the
//! installed package list is tracked in a manifest. The actual package
//! fetch/build is the host editor's business; here install/uninstall
//! maintain the manifest the editor reads.

use crate::error::{SyncError, SyncResult};
use crate::host::EditorHost;
use edsync_protocol::PackageDescriptor;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings blob file inside the config directory.
const CONFIG_FILE: &str = "config.json";
/// Installed package manifest inside the config directory.
const MANIFEST_FILE: &str = "packages.manifest.json";

/// An editor host over a configuration directory.
#[derive(Debug)]
pub struct DirectoryHost {
    dir: PathBuf,
    // install() runs from concurrent workers; manifest updates are
    // read-modify-write.
    manifest_lock: Mutex<()>,
}

impl DirectoryHost {
    /// Opens (or creates) a host over `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> SyncResult<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| SyncError::Host(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest_lock: Mutex::new(()),
        })
    }

    /// Returns the config directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json(&self, name: &str) -> SyncResult<Option<serde_json::Value>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| SyncError::Host(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write_json(&self, name: &str, value: &serde_json::Value) -> SyncResult<()> {
        let path = self.dir.join(name);
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(&path, raw)
            .map_err(|e| SyncError::Host(format!("cannot write {}: {}", path.display(), e)))
    }

    fn read_manifest(&self) -> SyncResult<Vec<PackageDescriptor>> {
        match self.read_json(MANIFEST_FILE)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_manifest(&self, packages: &[PackageDescriptor]) -> SyncResult<()> {
        self.write_json(MANIFEST_FILE, &serde_json::to_value(packages)?)
    }
}

impl EditorHost for DirectoryHost {
    fn settings(&self) -> SyncResult<serde_json::Value> {
        Ok(self
            .read_json(CONFIG_FILE)?
            .unwrap_or_else(|| serde_json::json!({})))
    }

    fn set_setting(&self, key_path: &str, value: &serde_json::Value) -> SyncResult<()> {
        let mut settings = self.settings()?;

        let mut node = &mut settings;
        let parts: Vec<&str> = key_path.split('.').collect();
        let (leaf, branches) = parts
            .split_last()
            .ok_or_else(|| SyncError::Host("empty key path".into()))?;
        for part in branches {
            if !node.is_object() {
                *node = serde_json::json!({});
            }
            node = node
                .as_object_mut()
                .ok_or_else(|| SyncError::Host("settings root is not an object".into()))?
                .entry(part.to_string())
                .or_insert_with(|| serde_json::json!({}));
        }
        if !node.is_object() {
            *node = serde_json::json!({});
        }
        node.as_object_mut()
            .ok_or_else(|| SyncError::Host("settings node is not an object".into()))?
            .insert((*leaf).to_string(), value.clone());

        self.write_json(CONFIG_FILE, &settings)
    }

    fn file_content(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.join(name)).ok()
    }

    fn write_file(&self, name: &str, content: &str) -> SyncResult<()> {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SyncError::Host(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        fs::write(&path, content)
            .map_err(|e| SyncError::Host(format!("cannot write {}: {}", path.display(), e)))
    }

    fn installed_packages(&self) -> SyncResult<Vec<PackageDescriptor>> {
        let mut packages = self.read_manifest()?;
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }

    fn is_installed(&self, name: &str) -> bool {
        self.read_manifest()
            .map(|packages| packages.iter().any(|p| p.name == name))
            .unwrap_or(false)
    }

    fn install(&self, package: &PackageDescriptor) -> SyncResult<()> {
        let _guard = self.manifest_lock.lock();
        let mut packages = self.read_manifest()?;
        if packages.iter().any(|p| p.name == package.name) {
            return Ok(());
        }
        packages.push(package.clone());
        self.write_manifest(&packages)
    }

    fn uninstall(&self, name: &str) -> SyncResult<()> {
        let _guard = self.manifest_lock.lock();
        let mut packages = self.read_manifest()?;
        let before = packages.len();
        packages.retain(|p| p.name != name);
        if packages.len() == before {
            return Err(SyncError::Host(format!("{} is not installed", name)));
        }
        self.write_manifest(&packages)
    }
}
