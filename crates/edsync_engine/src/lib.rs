//! # edsync Engine
//!
//! Sync reconciliation engine for edsync.
//!
//! This crate provides:
//! - Change classifier (client/server divergence → typed change records)
//! - Sync orchestrator (lock, sequential apply, periodic re-trigger)
//! - Apply handlers (backup, install/uninstall packages, apply settings)
//! - Remote settings gateway (auth, caching, bounded retry)
//! - Settings manager over the host editor seam
//! - Instance arbitration (in-process FIFO registry, cross-process lock)
//!
//! ## Architecture
//!
//! One sync cycle is a **classify-then-apply** pass:
//! 1. Fetch the server's lightweight info record
//! 2. Compare against the client's stored baseline timestamp
//! 3. Classify the divergence into an ordered list of change records
//! 4. Apply each record sequentially through its handler
//!
//! ## Key Invariants
//!
//! - Exactly two parties; last write wins by timestamp
//! - Changes are applied strictly in classifier order
//! - One cycle at a time per process; concurrent entrants are dropped
//! - Every successful handler re-baselines the client so the next
//!   classification pass is a no-op
//! - Cycle failures never escape `sync()`; the timer retries later

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classify;
mod config;
mod error;
mod fs_host;
mod gateway;
mod host;
mod http;
mod instance;
mod notify;
mod orchestrator;
mod settings;

pub use classify::{diff_packages, Classifier};
pub use config::{RetryConfig, SyncConfig, SyncPreferences};
pub use error::{SyncError, SyncResult};
pub use fs_host::DirectoryHost;
pub use gateway::{parse_auth_title, AuthSignal, Authenticator, SettingsGateway, StaticAuthenticator};
pub use host::{EditorHost, MemoryHost};
pub use http::{with_retry, HttpClient, LoopbackClient, LoopbackServer};
pub use instance::{InstanceRegistry, ProcessLock};
pub use notify::{MemoryNotifier, Notifier, NullNotifier};
pub use orchestrator::{SyncOrchestrator, SYNC_SUCCESS_MESSAGE};
pub use settings::SettingsManager;
