//! Collections - id-addressed namespaces layered on the storage engine
//!
//! Every collection shares the one physical file; isolation comes from key
//! prefixing. An entity's physical key is `"<name>:<id>"`, so a prefix scan
//! on `"<name>:"` recovers exactly that collection's entities at open time.

pub mod typed;

pub use typed::{Collection, Cursor, Description, NO_ID};

use crate::storage::{Record, Storage};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Byte-level CRUD for one named collection, with an id sequence that is
/// strictly increasing and never reused, even across deletes and reopens.
///
/// A collection-local lock guards the tracked id set together with the
/// engine calls, making each collection operation appear atomic with
/// respect to other operations on the same collection. (The engine's own
/// lock does not cover the id set, which is why this one exists.)
pub struct DataCollection {
    storage: Arc<dyn Storage>,
    name: String,
    sequence: AtomicU64,
    /// Tracked ids in insertion order; doubles as the iteration snapshot source
    ids: Mutex<Vec<u64>>,
}

impl std::fmt::Debug for DataCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollection")
            .field("name", &self.name)
            .field("sequence", &self.sequence)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl DataCollection {
    /// Reconstruct the collection's id set and sequence counter from the
    /// engine via a prefix scan.
    ///
    /// Names must be non-empty and colon-free so collection keys can never
    /// collide with each other or with the facade's key-value namespace.
    pub fn new(storage: Arc<dyn Storage>, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(':') {
            return Err(Error::InvalidCollectionName(name.to_string()));
        }

        let prefix = format!("{}:", name);
        let mut ids = Vec::new();
        let mut max_id = 0u64;

        for key in storage.keys_with_prefix(prefix.as_bytes()) {
            if let Some(id) = parse_id(key.as_bytes(), prefix.len()) {
                ids.push(id);
                max_id = max_id.max(id);
            }
        }

        debug!("collection {:?}: {} entities, max id {}", name, ids.len(), max_id);

        Ok(Self {
            storage,
            name: name.to_string(),
            sequence: AtomicU64::new(max_id),
            ids: Mutex::new(ids),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocate the next id. Strictly increasing; never reused.
    pub fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of tracked entities, O(1)
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Whether the collection holds no entities
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Fetch an entity's payload bytes
    pub fn get(&self, id: u64) -> Result<Option<Vec<u8>>> {
        let _guard = self.ids.lock();
        Ok(self.storage.get(&self.entity_key(id))?.map(|r| r.data))
    }

    /// Store an entity's payload bytes under `id`
    pub fn put(&self, id: u64, data: Vec<u8>) -> Result<()> {
        let mut ids = self.ids.lock();
        self.storage.put(Record::new(self.entity_key(id), data))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(())
    }

    /// Delete an entity, returning its prior payload. The id stays burned:
    /// the sequence counter never hands it out again.
    pub fn delete(&self, id: u64) -> Result<Option<Vec<u8>>> {
        let mut ids = self.ids.lock();
        let removed = match self.storage.remove(&self.entity_key(id))? {
            Some(record) => record,
            None => return Ok(None),
        };
        ids.retain(|&tracked| tracked != id);
        Ok(Some(removed.data))
    }

    /// Snapshot of the tracked ids in insertion order
    pub fn ids(&self) -> Vec<u64> {
        self.ids.lock().clone()
    }

    /// Stateful cursor over a snapshot of the tracked ids.
    ///
    /// Supports removing the current element. Mutation by other operations
    /// during a pass is unspecified beyond the cursor's own `remove`; ids
    /// that vanish behind the snapshot's back are skipped.
    pub fn cursor(&self) -> DataCursor<'_> {
        DataCursor {
            collection: self,
            ids: self.ids(),
            pos: 0,
            current: None,
        }
    }

    fn entity_key(&self, id: u64) -> Vec<u8> {
        format!("{}:{}", self.name, id).into_bytes()
    }
}

/// Parse the numeric suffix of a `"<name>:<id>"` key
fn parse_id(key: &[u8], prefix_len: usize) -> Option<u64> {
    std::str::from_utf8(key.get(prefix_len..)?)
        .ok()?
        .parse()
        .ok()
}

/// Explicit cursor over a snapshot of a collection's ids
pub struct DataCursor<'a> {
    collection: &'a DataCollection,
    ids: Vec<u64>,
    pos: usize,
    current: Option<u64>,
}

impl DataCursor<'_> {
    /// Advance to the next live entity, returning its id and payload, or
    /// `None` when the snapshot is exhausted.
    pub fn next(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        while self.pos < self.ids.len() {
            let id = self.ids[self.pos];
            self.pos += 1;

            if let Some(data) = self.collection.get(id)? {
                self.current = Some(id);
                return Ok(Some((id, data)));
            }
        }

        self.current = None;
        Ok(None)
    }

    /// Delete the element last returned by `next` from both the engine and
    /// the tracked id set, returning its payload.
    pub fn remove(&mut self) -> Result<Option<Vec<u8>>> {
        match self.current.take() {
            Some(id) => self.collection.delete(id),
            None => Ok(None),
        }
    }
}
