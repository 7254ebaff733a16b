//! Storage engine - one data file, an in-memory offset index, and
//! immediate compaction on delete/overwrite

mod file;
mod record;

pub use file::FileStorage;
pub use record::{Key, Record, HEADER_LEN};

use crate::Result;

/// Byte-level storage contract.
///
/// Implementations own their backing medium exclusively; all methods are
/// synchronous and safe to call from multiple threads.
pub trait Storage: Send + Sync {
    /// Look up a record by key. Missing keys are not an error.
    fn get(&self, key: &[u8]) -> Result<Option<Record>>;

    /// Insert or overwrite a record. Overwriting physically relocates the
    /// record; exactly one occurrence of the key remains afterwards.
    fn put(&self, record: Record) -> Result<()>;

    /// Remove a record, returning its prior value if it existed.
    fn remove(&self, key: &[u8]) -> Result<Option<Record>>;

    /// All currently indexed keys, in no guaranteed order.
    fn keys(&self) -> Vec<Key>;

    /// Keys whose bytes begin with `prefix`.
    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Key>;

    /// Flush the backing medium.
    fn sync(&self) -> Result<()>;
}
