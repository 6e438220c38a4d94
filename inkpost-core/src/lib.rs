//! inkpost core library — domain types, pending-change cache, post mapping
//! store, configuration and errors.
//!
//! - [`types`] — newtypes, [`PendingChangeSet`], [`MappingRecord`]
//! - [`cache`] — [`PendingChangeCache`] (JSON, merge rules, confirmation)
//! - [`store`] — [`IdentifierStore`] (SQLite)
//! - [`confirm`] — injected [`Confirm`] capability
//! - [`config`] — `~/.inkpost/config.yaml`
//! - [`error`] — [`CacheError`], [`StoreError`], [`ConfigError`], [`ConflictError`]
//!
//! Neither the cache file nor the store is locked: one process at a time.

pub mod cache;
pub mod config;
pub mod confirm;
pub mod error;
pub mod store;
pub mod types;

pub use cache::PendingChangeCache;
pub use config::Config;
pub use confirm::{AssumeNo, AssumeYes, Confirm};
pub use error::{CacheError, ConfigError, ConflictError, StoreError};
pub use store::IdentifierStore;
pub use types::{
    Change, ChangeKind, DerivedSet, MappingRecord, PendingChangeSet, PostId, RelPath, RenamePair,
    DEFAULT_WEIGHT,
};
