//! # edsync Store
//!
//! Persisted sync state for edsync.
//!
//! This crate provides:
//! - `StateStore` trait for the client's sync baseline and credentials
//! - `MemoryStateStore` for tests and ephemeral runs
//! - `FileStateStore` for durable state surviving process restarts
//!
//! The stored state is three scalar entries under the `edsync` namespace:
//! the last client update timestamp, the snapshot checksum of that update,
//! and the cached auth token. Absent timestamp means "never synced";
//! absent token means "unauthenticated".

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod state;

pub use error::{StoreError, StoreResult};
pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use state::{PersistedState, StateStore};
