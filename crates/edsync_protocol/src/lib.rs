//! # edsync Protocol
//!
//! Settings sync data contracts for edsync.
//!
//! This crate provides:
//! - `PackageDescriptor` for installed packages and themes
//! - `SettingsFiles` / `SettingsSnapshot` for serialized configuration state
//! - `SettingsInfo` / `SaveOutcome` for the lightweight server summary records
//! - `ChangeKind` / `ChangeRecord` for reconciliation instructions
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod files;
mod info;
mod package;

pub use change::{ChangeKind, ChangeRecord};
pub use files::{
    placeholder_comment, FileEntry, SettingsFiles, SettingsSnapshot, INIT_FILE, KEYMAP_FILE,
    PACKAGES_FILE, SETTINGS_FILE, SNIPPETS_FILE, STYLES_FILE,
};
pub use info::{SaveOutcome, SettingsInfo};
pub use package::{PackageDescriptor, PackageDiff};
