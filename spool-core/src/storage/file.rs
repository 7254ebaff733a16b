//! File-backed storage engine
//!
//! Owns one data file for its lifetime. Records are appended contiguously;
//! an in-memory index maps each key to its current file offset and is
//! rebuilt by a full sequential scan on open. Removing or overwriting a
//! record immediately reclaims its bytes by shifting everything after it
//! left and truncating the file, so the file never holds dead spans.
//!
//! A single read-write lock guards the file and index as one unit: reads
//! run concurrently, mutations are exclusive. Reads use positional I/O so
//! concurrent readers never race on a shared cursor.
//!
//! Opening the same path from two live instances is unsupported and risks
//! corruption; no cross-process locking is provided at this layer.

use super::{Key, Record, Storage, HEADER_LEN};
use crate::config::{MAX_COPY_BUFFER, MIN_COPY_BUFFER};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed [`Storage`] implementation
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    /// Cached file length; kept in step with every append and truncate
    len: u64,
    index: HashMap<Key, u64>,
}

impl FileStorage {
    /// Open the data file at `path`, creating it if absent.
    ///
    /// An existing file is scanned from offset 0 to rebuild the index; a
    /// malformed header fails the open with [`Error::Corruption`] and no
    /// partial index is ever used.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let index = Self::rebuild_index(&file, len)?;

        info!("opened {:?}: {} records, {} bytes", path, index.len(), len);

        Ok(Self {
            path,
            inner: RwLock::new(Inner { file, len, index }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes
    pub fn len_bytes(&self) -> u64 {
        self.inner.read().len
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Sequentially scan the file, recording each record's offset.
    fn rebuild_index(file: &File, len: u64) -> Result<HashMap<Key, u64>> {
        let mut index = HashMap::new();
        let mut pos = 0u64;

        while pos < len {
            if len - pos < HEADER_LEN {
                return Err(Error::Corruption(format!(
                    "truncated record header at offset {}",
                    pos
                )));
            }

            let mut header = [0u8; HEADER_LEN as usize];
            file.read_exact_at(&mut header, pos)?;
            let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as u64;
            let data_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as u64;

            let end = pos + HEADER_LEN + key_len + data_len;
            if end > len {
                return Err(Error::Corruption(format!(
                    "record at offset {} overruns end of file ({} > {})",
                    pos, end, len
                )));
            }

            let mut key = vec![0u8; key_len as usize];
            file.read_exact_at(&mut key, pos + HEADER_LEN)?;

            index.insert(Key::new(key), pos);
            pos = end;
        }

        Ok(index)
    }

    /// Read the full record stored at `pos`.
    fn read_record_at(file: &File, pos: u64) -> Result<Record> {
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact_at(&mut header, pos)?;
        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let data_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        let mut key = vec![0u8; key_len];
        file.read_exact_at(&mut key, pos + HEADER_LEN)?;

        let mut data = vec![0u8; data_len];
        file.read_exact_at(&mut data, pos + HEADER_LEN + key_len as u64)?;

        Ok(Record { key, data })
    }

    /// Physically remove the indexed record for `key`, compacting the file.
    ///
    /// Caller must hold the write lock. Every index offset past the removed
    /// span is decremented before returning, so index and file stay
    /// mutually consistent at all observable points.
    fn remove_record(inner: &mut Inner, key: &Key) -> Result<Option<Record>> {
        let pos = match inner.index.get(key) {
            Some(&pos) => pos,
            None => return Ok(None),
        };

        let record = Self::read_record_at(&inner.file, pos)?;
        let span = record.size() as u64;

        if pos + span >= inner.len {
            // Last record: trim the file and be done.
            inner.file.set_len(pos)?;
            inner.len = pos;
        } else {
            Self::shift_left(inner, pos, span)?;
            inner.len -= span;
            inner.file.set_len(inner.len)?;

            for offset in inner.index.values_mut() {
                if *offset > pos {
                    *offset -= span;
                }
            }
        }

        inner.index.remove(key);
        Ok(Some(record))
    }

    /// Shift every byte from `pos + span` through end-of-file left by
    /// `span`, overwriting the removed record, using a bounded scratch
    /// buffer in sequential chunks.
    ///
    /// A failure partway through leaves file and index inconsistent; there
    /// is no journal or rollback here, so it surfaces as corruption.
    fn shift_left(inner: &mut Inner, pos: u64, span: u64) -> Result<()> {
        let remaining = inner.len - (pos + span);
        let mut buf = vec![0u8; copy_buffer_size(remaining)];

        let mut from = pos + span;
        let mut to = pos;

        while from < inner.len {
            let chunk = ((inner.len - from) as usize).min(buf.len());
            inner
                .file
                .read_exact_at(&mut buf[..chunk], from)
                .and_then(|_| inner.file.write_all_at(&buf[..chunk], to))
                .map_err(|e| {
                    Error::Corruption(format!("byte shift failed at offset {}: {}", from, e))
                })?;

            from += chunk as u64;
            to += chunk as u64;
        }

        debug!("compacted {} bytes starting at offset {}", remaining, pos);
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        let inner = self.inner.read();
        match inner.index.get(&Key::from(key)) {
            Some(&pos) => Ok(Some(Self::read_record_at(&inner.file, pos)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: Record) -> Result<()> {
        if record.key.len() > u32::MAX as usize || record.data.len() > u32::MAX as usize {
            return Err(Error::Corruption(
                "record field exceeds the 4-byte length prefix".to_string(),
            ));
        }

        let mut inner = self.inner.write();
        let key = Key::new(record.key.clone());

        // Uniform remove-then-append: an overwrite relocates the record.
        if inner.index.contains_key(&key) {
            Self::remove_record(&mut inner, &key)?;
        }

        let pos = inner.len;
        inner.file.write_all_at(&record.encode(), pos)?;
        inner.len = pos + record.size() as u64;
        inner.index.insert(key, pos);

        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Record>> {
        let mut inner = self.inner.write();
        Self::remove_record(&mut inner, &Key::from(key))
    }

    fn keys(&self) -> Vec<Key> {
        self.inner.read().index.keys().cloned().collect()
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Key> {
        self.inner
            .read()
            .index
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect()
    }

    fn sync(&self) -> Result<()> {
        self.inner.read().file.sync_all()?;
        Ok(())
    }
}

/// Scratch buffer sizing for the compaction shift: as large as the bytes
/// left to move, clamped between 1 KiB and 16 MiB to bound transient
/// memory on very large files while amortizing I/O calls on small ones.
fn copy_buffer_size(remaining: u64) -> usize {
    remaining.clamp(MIN_COPY_BUFFER as u64, MAX_COPY_BUFFER as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("data.spool")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, storage) = open_temp();

        let record = Record::new(b"hello".to_vec(), b"world".to_vec());
        storage.put(record.clone()).unwrap();

        let got = storage.get(b"hello").unwrap().unwrap();
        assert_eq!(got, record);
    }

    #[test]
    fn test_get_missing_key() {
        let (_dir, storage) = open_temp();
        assert!(storage.get(b"nope").unwrap().is_none());
    }

    #[test]
    fn test_remove_missing_key() {
        let (_dir, storage) = open_temp();
        assert!(storage.remove(b"nope").unwrap().is_none());
    }

    #[test]
    fn test_remove_returns_prior_value() {
        let (_dir, storage) = open_temp();

        let record = Record::new(b"k".to_vec(), vec![9, 9]);
        storage.put(record.clone()).unwrap();

        let removed = storage.remove(b"k").unwrap().unwrap();
        assert_eq!(removed, record);
        assert!(storage.get(b"k").unwrap().is_none());
        assert_eq!(storage.len_bytes(), 0);
    }

    #[test]
    fn test_overwrite_leaves_single_record() {
        let (_dir, storage) = open_temp();

        storage.put(Record::new(b"k".to_vec(), vec![1, 2, 3, 4])).unwrap();
        storage.put(Record::new(b"k".to_vec(), vec![5])).unwrap();

        let got = storage.get(b"k").unwrap().unwrap();
        assert_eq!(got.data, vec![5]);

        // No orphaned bytes: file length equals the one live record's span.
        assert_eq!(storage.len_bytes(), got.size() as u64);
        assert_eq!(storage.record_count(), 1);
    }

    #[test]
    fn test_middle_deletion_integrity() {
        let (_dir, storage) = open_temp();

        let a = Record::new(b"a".to_vec(), vec![1; 100]);
        let b = Record::new(b"b".to_vec(), vec![2; 50]);
        let c = Record::new(b"c".to_vec(), vec![3; 200]);
        storage.put(a.clone()).unwrap();
        storage.put(b.clone()).unwrap();
        storage.put(c.clone()).unwrap();

        storage.remove(b"b").unwrap();

        assert_eq!(storage.get(b"a").unwrap().unwrap(), a);
        assert_eq!(storage.get(b"c").unwrap().unwrap(), c);
        assert!(storage.get(b"b").unwrap().is_none());
        assert_eq!(storage.len_bytes(), (a.size() + c.size()) as u64);
    }

    #[test]
    fn test_delete_first_of_many() {
        let (_dir, storage) = open_temp();

        for i in 0..20u8 {
            storage
                .put(Record::new(vec![i], vec![i; i as usize + 1]))
                .unwrap();
        }
        storage.remove(&[0u8]).unwrap();

        for i in 1..20u8 {
            let got = storage.get(&[i]).unwrap().unwrap();
            assert_eq!(got.data, vec![i; i as usize + 1]);
        }
    }

    #[test]
    fn test_concrete_scenario() {
        let (_dir, storage) = open_temp();

        storage.put(Record::new(b"a".to_vec(), vec![1, 2, 3])).unwrap();
        storage.put(Record::new(b"b".to_vec(), vec![4, 5])).unwrap();
        storage.remove(b"a").unwrap();

        assert!(storage.get(b"a").unwrap().is_none());
        assert_eq!(storage.get(b"b").unwrap().unwrap().data, vec![4, 5]);
        assert_eq!(storage.record_count(), 1);
        assert_eq!(
            storage.len_bytes(),
            Record::new(b"b".to_vec(), vec![4, 5]).size() as u64
        );
    }

    #[test]
    fn test_reopen_durability() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.spool");

        {
            let storage = FileStorage::open(&path).unwrap();
            for i in 0..50u32 {
                storage
                    .put(Record::new(
                        format!("key-{}", i).into_bytes(),
                        i.to_le_bytes().to_vec(),
                    ))
                    .unwrap();
            }
            storage.sync().unwrap();
        }

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.record_count(), 50);
        for i in 0..50u32 {
            let got = storage.get(format!("key-{}", i).as_bytes()).unwrap().unwrap();
            assert_eq!(got.data, i.to_le_bytes().to_vec());
        }
    }

    #[test]
    fn test_keys_and_prefix_scan() {
        let (_dir, storage) = open_temp();

        storage.put(Record::new(b"books:1".to_vec(), vec![1])).unwrap();
        storage.put(Record::new(b"books:2".to_vec(), vec![2])).unwrap();
        storage.put(Record::new(b"authors:1".to_vec(), vec![3])).unwrap();

        assert_eq!(storage.keys().len(), 3);

        let books = storage.keys_with_prefix(b"books:");
        assert_eq!(books.len(), 2);
        assert!(books.iter().all(|k| k.has_prefix(b"books:")));
    }

    #[test]
    fn test_corrupted_header_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.spool");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.put(Record::new(b"k".to_vec(), vec![1, 2, 3])).unwrap();
        }

        // Append a header that claims more bytes than the file holds.
        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(&100u32.to_le_bytes());
        raw.extend_from_slice(&100u32.to_le_bytes());
        std::fs::write(&path, &raw).unwrap();

        let err = FileStorage::open(&path).unwrap_err();
        assert!(err.is_corruption(), "expected corruption, got {:?}", err);
    }

    #[test]
    fn test_truncated_header_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.spool");
        std::fs::write(&path, [0u8; 5]).unwrap();

        let err = FileStorage::open(&path).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_compaction_with_large_trailing_region() {
        let (_dir, storage) = open_temp();
        storage.put(Record::new(b"victim".to_vec(), vec![0xAB; 64])).unwrap();
        storage.put(Record::new(b"big".to_vec(), vec![0xCD; 5000])).unwrap();
        storage.put(Record::new(b"tail".to_vec(), vec![0xEF; 10])).unwrap();

        storage.remove(b"victim").unwrap();

        assert_eq!(storage.get(b"big").unwrap().unwrap().data, vec![0xCD; 5000]);
        assert_eq!(storage.get(b"tail").unwrap().unwrap().data, vec![0xEF; 10]);
    }

    #[test]
    fn test_copy_buffer_size_clamp() {
        assert_eq!(copy_buffer_size(10), MIN_COPY_BUFFER);
        assert_eq!(copy_buffer_size(4096), 4096);
        assert_eq!(copy_buffer_size(u64::MAX), MAX_COPY_BUFFER);
    }

    #[test]
    fn test_concurrent_readers() {
        use std::sync::Arc;

        let (_dir, storage) = open_temp();
        let storage = Arc::new(storage);
        for i in 0..100u32 {
            storage
                .put(Record::new(i.to_le_bytes().to_vec(), vec![7; 32]))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for i in 0..100u32 {
                        let got = storage.get(&i.to_le_bytes()).unwrap().unwrap();
                        assert_eq!(got.data, vec![7; 32]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
