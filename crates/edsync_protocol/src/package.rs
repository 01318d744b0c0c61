//! Package descriptors and package set diffs.

use serde::{Deserialize, Serialize};

/// A package installed in the editor.
///
/// Identity is `name` alone. The version is informational and excluded
/// from diffing, so upgrading a package on one machine does not count as
/// a divergence between client and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package name (unique identity).
    pub name: String,
    /// Installed version, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether the package is a theme.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub theme: bool,
}

impl PackageDescriptor {
    /// Creates a descriptor with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            theme: false,
        }
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Marks the package as a theme.
    pub fn with_theme(mut self, theme: bool) -> Self {
        self.theme = theme;
        self
    }

    /// Returns "theme" or "package", for log messages.
    pub fn kind_label(&self) -> &'static str {
        if self.theme {
            "theme"
        } else {
            "package"
        }
    }
}

/// The difference between two package sets.
///
/// `added` carries full descriptors (they must be installable), while
/// `removed` carries names only (a name is enough to uninstall).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDiff {
    /// Packages present in the new set but not the old one.
    pub added: Vec<PackageDescriptor>,
    /// Names present in the old set but not the new one.
    pub removed: Vec<String>,
}

impl PackageDiff {
    /// Returns true if neither side of the diff has entries.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
