//! Settings files and snapshots.

use crate::package::PackageDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical name of the settings blob file.
pub const SETTINGS_FILE: &str = "settings.json";
/// Logical name of the key bindings file.
pub const KEYMAP_FILE: &str = "keymap.cson";
/// Logical name of the user style sheet.
pub const STYLES_FILE: &str = "styles.less";
/// Logical name of the initialization script.
pub const INIT_FILE: &str = "init.coffee";
/// Logical name of the snippets file.
pub const SNIPPETS_FILE: &str = "snippets.cson";
/// Logical name of the serialized package list.
pub const PACKAGES_FILE: &str = "packages.json";

/// The content of one settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File content, verbatim.
    pub content: String,
}

impl FileEntry {
    /// Creates an entry from content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A mapping from logical file name to content.
///
/// A `BTreeMap` keeps the serialization stable and order-independent,
/// which the snapshot checksum relies on.
pub type SettingsFiles = BTreeMap<String, FileEntry>;

/// The full serialized set of settings and package files at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// Settings files keyed by logical name.
    pub files: SettingsFiles,
}

impl SettingsSnapshot {
    /// Creates a snapshot from a files mapping.
    pub fn new(files: SettingsFiles) -> Self {
        Self { files }
    }

    /// Parses the package list out of the `packages.json` entry.
    ///
    /// Returns an empty list when the entry is absent.
    pub fn packages(&self) -> Result<Vec<PackageDescriptor>, serde_json::Error> {
        match self.files.get(PACKAGES_FILE) {
            Some(entry) => serde_json::from_str(&entry.content),
            None => Ok(Vec::new()),
        }
    }

    /// Parses the settings blob out of the `settings.json` entry.
    ///
    /// Returns `None` when the entry is absent.
    pub fn settings_blob(&self) -> Option<Result<serde_json::Value, serde_json::Error>> {
        self.files
            .get(SETTINGS_FILE)
            .map(|entry| serde_json::from_str(&entry.content))
    }
}

/// Builds the placeholder comment used when a local settings file is missing.
///
/// The comment syntax is chosen by file extension so the placeholder stays a
/// valid file in its own language.
pub fn placeholder_comment(file_name: &str) -> String {
    let ext = file_name
        .rfind('.')
        .map(|i| file_name[i..].to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        ".less" | ".scss" | ".js" => format!("// {} (not found)", file_name),
        ".css" => format!("/* {} (not found) */", file_name),
        _ => format!("# {} (not found)", file_name),
    }
}
