//! Typed collections - converter-backed CRUD and filtering
//!
//! A [`Collection`] wraps a [`DataCollection`] with a [`Converter`] and a
//! [`Description`] accessor pair, so the engine never learns about any
//! concrete value type and values never need a special id field shape.

use super::{DataCollection, DataCursor};
use crate::convert::Converter;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Sentinel id meaning "not assigned yet, allocate on write"
pub const NO_ID: u64 = 0;

/// Id accessor pair for a stored value type.
///
/// Decouples id extraction and assignment from any particular value
/// representation; no field conventions or reflection involved.
pub struct Description<T> {
    get_id: Box<dyn Fn(&T) -> u64 + Send + Sync>,
    set_id: Box<dyn Fn(T, u64) -> T + Send + Sync>,
}

impl<T> Description<T> {
    /// Build a description from the two accessors
    pub fn new(
        get_id: impl Fn(&T) -> u64 + Send + Sync + 'static,
        set_id: impl Fn(T, u64) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            get_id: Box::new(get_id),
            set_id: Box::new(set_id),
        }
    }

    /// Read a value's id
    pub fn id_of(&self, value: &T) -> u64 {
        (self.get_id)(value)
    }

    /// Produce an id-assigned copy of a value
    pub fn with_id(&self, value: T, id: u64) -> T {
        (self.set_id)(value, id)
    }
}

/// Typed view over one named collection
pub struct Collection<T, C: Converter> {
    data: Arc<DataCollection>,
    converter: Arc<C>,
    description: Description<T>,
}

impl<T, C> Collection<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Converter,
{
    pub(crate) fn new(
        data: Arc<DataCollection>,
        converter: Arc<C>,
        description: Description<T>,
    ) -> Self {
        Self {
            data,
            converter,
            description,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        self.data.name()
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the collection holds no entities
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Store a value, allocating a fresh id when the value carries the
    /// [`NO_ID`] sentinel. Returns the id-assigned value.
    ///
    /// The payload is fully serialized before any store call, so a
    /// converter failure never leaves a partial record behind.
    pub fn put(&self, value: T) -> Result<T> {
        let mut id = self.description.id_of(&value);
        let value = if id == NO_ID {
            id = self.data.next_id();
            self.description.with_id(value, id)
        } else {
            value
        };

        let bytes = self.converter.to_bytes(&value)?;
        self.data.put(id, bytes)?;
        Ok(value)
    }

    /// Store several values, returning the id-assigned copies
    pub fn put_all(&self, values: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        values.into_iter().map(|value| self.put(value)).collect()
    }

    /// Fetch a value by id
    pub fn get(&self, id: u64) -> Result<Option<T>> {
        match self.data.get(id)? {
            Some(bytes) => Ok(Some(self.converter.from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a value by id, returning the removed value if it existed
    pub fn delete(&self, id: u64) -> Result<Option<T>> {
        match self.data.delete(id)? {
            Some(bytes) => Ok(Some(self.converter.from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Full scan keeping the values that satisfy `predicate`. Never
    /// mutates the underlying storage.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        let mut matches = Vec::new();
        let mut cursor = self.data.cursor();

        while let Some((_, bytes)) = cursor.next()? {
            let value: T = self.converter.from_bytes(&bytes)?;
            if predicate(&value) {
                matches.push(value);
            }
        }

        Ok(matches)
    }

    /// All stored values
    pub fn all(&self) -> Result<Vec<T>> {
        self.filter(|_| true)
    }

    /// Delete every entity in this collection
    pub fn clear(&self) -> Result<()> {
        for id in self.data.ids() {
            self.data.delete(id)?;
        }
        Ok(())
    }

    /// Typed cursor over the collection; removal cascades to the engine
    pub fn cursor(&self) -> Cursor<'_, T, C> {
        Cursor {
            inner: self.data.cursor(),
            collection: self,
        }
    }
}

/// Typed pass-through of [`DataCursor`]
pub struct Cursor<'a, T, C: Converter> {
    inner: DataCursor<'a>,
    collection: &'a Collection<T, C>,
}

impl<T, C> Cursor<'_, T, C>
where
    T: Serialize + DeserializeOwned,
    C: Converter,
{
    /// Advance to the next value, or `None` when exhausted
    pub fn next(&mut self) -> Result<Option<T>> {
        match self.inner.next()? {
            Some((_, bytes)) => Ok(Some(self.collection.converter.from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete the value last returned by `next`, returning it
    pub fn remove(&mut self) -> Result<Option<T>> {
        match self.inner.remove()? {
            Some(bytes) => Ok(Some(self.collection.converter.from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}
