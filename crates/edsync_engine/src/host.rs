//! Host editor abstraction.
//!
//! The engine never touches the editor's configuration store or package
//! installer directly; everything goes through the `EditorHost` trait.
//! This keeps the reconciliation core testable and editor-agnostic.

use crate::error::{SyncError, SyncResult};
use edsync_protocol::PackageDescriptor;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};

/// The host editor's configuration store and package installer.
pub trait EditorHost: Send + Sync {
    /// Returns the full settings blob.
    fn settings(&self) -> SyncResult<serde_json::Value>;

    /// Sets one setting by dot-separated key path.
    fn set_setting(&self, key_path: &str, value: &serde_json::Value) -> SyncResult<()>;

    /// Returns the content of a config file, or `None` when it does not exist.
    fn file_content(&self, name: &str) -> Option<String>;

    /// Writes a config file.
    fn write_file(&self, name: &str, content: &str) -> SyncResult<()>;

    /// Returns installed packages, sorted by name.
    fn installed_packages(&self) -> SyncResult<Vec<PackageDescriptor>>;

    /// Returns true if a package is installed.
    fn is_installed(&self, name: &str) -> bool;

    /// Installs a package.
    fn install(&self, package: &PackageDescriptor) -> SyncResult<()>;

    /// Uninstalls a package by name.
    fn uninstall(&self, name: &str) -> SyncResult<()>;
}

/// An in-memory editor host for testing.
#[derive(Debug, Default)]
pub struct MemoryHost {
    settings: RwLock<serde_json::Value>,
    files: RwLock<BTreeMap<String, String>>,
    packages: RwLock<Vec<PackageDescriptor>>,
    failing_installs: RwLock<HashSet<String>>,
    failing_uninstalls: RwLock<HashSet<String>>,
    install_log: RwLock<Vec<String>>,
    uninstall_log: RwLock<Vec<String>>,
}

impl MemoryHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(serde_json::json!({})),
            ..Self::default()
        }
    }

    /// Replaces the settings blob.
    pub fn set_settings(&self, settings: serde_json::Value) {
        *self.settings.write() = settings;
    }

    /// Puts a config file.
    pub fn put_file(&self, name: impl Into<String>, content: impl Into<String>) {
        self.files.write().insert(name.into(), content.into());
    }

    /// Adds an installed package.
    pub fn add_package(&self, package: PackageDescriptor) {
        self.packages.write().push(package);
    }

    /// Makes installs of the named package fail.
    pub fn fail_install(&self, name: impl Into<String>) {
        self.failing_installs.write().insert(name.into());
    }

    /// Makes uninstalls of the named package fail.
    pub fn fail_uninstall(&self, name: impl Into<String>) {
        self.failing_uninstalls.write().insert(name.into());
    }

    /// Names passed to `install`, in call order.
    pub fn install_log(&self) -> Vec<String> {
        self.install_log.read().clone()
    }

    /// Names passed to `uninstall`, in call order.
    pub fn uninstall_log(&self) -> Vec<String> {
        self.uninstall_log.read().clone()
    }
}

impl EditorHost for MemoryHost {
    fn settings(&self) -> SyncResult<serde_json::Value> {
        Ok(self.settings.read().clone())
    }

    fn set_setting(&self, key_path: &str, value: &serde_json::Value) -> SyncResult<()> {
        let mut settings = self.settings.write();
        let mut node = &mut *settings;
        let parts: Vec<&str> = key_path.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            if !node.is_object() {
                *node = serde_json::json!({});
            }
            node = node
                .as_object_mut()
                .ok_or_else(|| SyncError::Host("settings root is not an object".into()))?
                .entry(part.to_string())
                .or_insert_with(|| serde_json::json!({}));
        }
        let leaf = parts
            .last()
            .ok_or_else(|| SyncError::Host("empty key path".into()))?;
        if !node.is_object() {
            *node = serde_json::json!({});
        }
        node.as_object_mut()
            .ok_or_else(|| SyncError::Host("settings node is not an object".into()))?
            .insert((*leaf).to_string(), value.clone());
        Ok(())
    }

    fn file_content(&self, name: &str) -> Option<String> {
        self.files.read().get(name).cloned()
    }

    fn write_file(&self, name: &str, content: &str) -> SyncResult<()> {
        self.files.write().insert(name.into(), content.into());
        Ok(())
    }

    fn installed_packages(&self) -> SyncResult<Vec<PackageDescriptor>> {
        let mut packages = self.packages.read().clone();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }

    fn is_installed(&self, name: &str) -> bool {
        self.packages.read().iter().any(|p| p.name == name)
    }

    fn install(&self, package: &PackageDescriptor) -> SyncResult<()> {
        self.install_log.write().push(package.name.clone());
        if self.failing_installs.read().contains(&package.name) {
            return Err(SyncError::Host(format!(
                "install of {} refused",
                package.name
            )));
        }
        self.packages.write().push(package.clone());
        Ok(())
    }

    fn uninstall(&self, name: &str) -> SyncResult<()> {
        self.uninstall_log.write().push(name.to_string());
        if self.failing_uninstalls.read().contains(name) {
            return Err(SyncError::Host(format!("uninstall of {} refused", name)));
        }
        self.packages.write().retain(|p| p.name != name);
        Ok(())
    }
}
