//! Lightweight server summary records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of the settings stored on the server.
///
/// Fetched cheaply to decide whether a full snapshot fetch is needed.
/// Both fields are absent when the server has never stored data for
/// this account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInfo {
    /// Content checksum of the server-side snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Point in time the server-side snapshot was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl SettingsInfo {
    /// Creates an info record for a server that holds data.
    pub fn new(checksum: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            checksum: Some(checksum.into()),
            last_update: Some(last_update),
        }
    }

    /// Creates an info record for a server with no stored data.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result of saving a snapshot to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    /// Whether the server accepted the snapshot.
    #[serde(default)]
    pub success: bool,
    /// Server timestamp assigned to the saved snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}
