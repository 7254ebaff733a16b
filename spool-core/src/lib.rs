//! Spool Core - Embedded Single-File Key-Value Store
//!
//! A lightweight persistence library for local, in-process storage:
//! - One append-oriented data file, no daemon, no network
//! - In-memory offset index rebuilt by a full scan on open
//! - Immediate physical compaction on delete and overwrite
//! - Id-addressed "collections" namespaced inside the shared file
//! - Typed CRUD through a pluggable [`Converter`] codec
//!
//! # Architecture
//!
//! ```text
//! Spool (facade)
//!   ├── string key/value access        ("::kv::<key>")
//!   └── Collection<T>                  (typed CRUD + filtering)
//!         └── DataCollection           (id sequence, "<name>:<id>" keys)
//!               └── FileStorage        (index + compaction, one file)
//! ```
//!
//! All operations are synchronous and blocking. The engine serializes
//! writers behind one exclusive lock and allows concurrent readers.

pub mod collection;
pub mod convert;
pub mod db;
pub mod storage;

mod error;

pub use collection::{Collection, DataCollection, Description, NO_ID};
pub use convert::{Converter, JsonConverter};
pub use db::Spool;
pub use error::{Error, Result};
pub use storage::{FileStorage, Key, Record, Storage};

/// Spool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Smallest scratch buffer used when shifting bytes during compaction (1 KiB)
    pub const MIN_COPY_BUFFER: usize = 1024;

    /// Largest scratch buffer used when shifting bytes during compaction (16 MiB)
    pub const MAX_COPY_BUFFER: usize = 16 * 1024 * 1024;

    /// Key prefix reserved for the facade's string key/value space.
    ///
    /// Collection names may not contain `:` (or be empty), so no
    /// collection-entity key can ever start with this marker.
    pub const KV_MARKER: &str = "::kv::";
}
