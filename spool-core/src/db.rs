//! Spool facade - one engine, one converter, many collections
//!
//! The top-level entry point. Binds a [`FileStorage`] engine to a
//! [`Converter`] and exposes direct string-keyed access plus a collection
//! factory. All collections and the key-value space share the one file.

use crate::collection::{Collection, DataCollection, Description};
use crate::config::KV_MARKER;
use crate::convert::{Converter, JsonConverter};
use crate::storage::{FileStorage, Record, Storage};
use crate::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Embedded single-file store.
///
/// Opening the same path from two live instances is unsupported; the
/// engine assumes exclusive ownership of its file.
pub struct Spool<C: Converter = JsonConverter> {
    storage: Arc<dyn Storage>,
    converter: Arc<C>,
    collections: RwLock<HashMap<String, Arc<DataCollection>>>,
}

impl Spool<JsonConverter> {
    /// Open a store at `path` with the bundled JSON converter, creating
    /// the file if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, JsonConverter)
    }
}

impl<C: Converter> Spool<C> {
    /// Open a store at `path` with a custom converter
    pub fn open_with(path: impl AsRef<Path>, converter: C) -> Result<Self> {
        Ok(Self {
            storage: Arc::new(FileStorage::open(path)?),
            converter: Arc::new(converter),
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Fetch a value stored under a logical string key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get(&self.kv_key(key)?)? {
            Some(record) => Ok(Some(self.converter.from_bytes(&record.data)?)),
            None => Ok(None),
        }
    }

    /// Store a value under a logical string key
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let key = self.kv_key(key)?;
        let data = self.converter.to_bytes(value)?;
        self.storage.put(Record::new(key, data))
    }

    /// Delete a logical string key, reporting whether a record existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.storage.remove(&self.kv_key(key)?)?.is_some())
    }

    /// Typed collection of the given name.
    ///
    /// The underlying [`DataCollection`] is created lazily on first access
    /// and cached for the facade's lifetime; names must be non-empty and
    /// colon-free.
    pub fn collection<T>(&self, name: &str, description: Description<T>) -> Result<Collection<T, C>>
    where
        T: Serialize + DeserializeOwned,
    {
        // Fast path: already constructed.
        let existing = self.collections.read().get(name).cloned();
        let data = match existing {
            Some(data) => data,
            None => {
                let data = Arc::new(DataCollection::new(self.storage.clone(), name)?);
                self.collections
                    .write()
                    .entry(name.to_string())
                    .or_insert_with(|| data.clone())
                    .clone()
            }
        };

        Ok(Collection::new(data, self.converter.clone(), description))
    }

    /// Flush the engine's file to disk. The handle itself is released when
    /// the facade (and every collection borrowed from it) drops.
    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }

    /// Physical key for the string key/value space: the namespace marker
    /// prepended, then run through the converter like any other payload key.
    fn kv_key(&self, key: &str) -> Result<Vec<u8>> {
        self.converter.to_bytes(&format!("{}{}", KV_MARKER, key))
    }
}
