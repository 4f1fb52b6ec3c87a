use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::storage::kv_store::{KVStore, KVStoreError, WriteBatchOperation};

/// In-memory implementation of KVStore
///
/// Keys are kept ordered so `scan_prefix` behaves like the RocksDB iterator.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_open(&self) -> Result<(), KVStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }
}

impl KVStore for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.check_open()?;
        self.data
            .write()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.check_open()?;
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.check_open()?;
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.check_open()?;
        Ok(self.data.read().unwrap().contains_key(key))
    }

    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError> {
        self.check_open()?;
        let mut data = self.data.write().unwrap();
        for op in operations {
            match op {
                WriteBatchOperation::Put { key, value } => {
                    data.insert(key, value);
                },
                WriteBatchOperation::Delete { key } => {
                    data.remove(&key);
                },
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.check_open()?;
        let data = self.data.read().unwrap();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        self.check_open()
    }

    fn close(&self) -> Result<(), KVStoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv_store::WriteBatchOperationExt;

    #[test]
    fn test_batch_and_scan() {
        let store = MemoryStore::new();

        let mut batch = Vec::new();
        batch.put(vec![2, 1], b"a".to_vec());
        batch.put(vec![2, 2], b"b".to_vec());
        batch.put(vec![3], b"c".to_vec());
        store.write_batch(batch).unwrap();

        let mut batch = Vec::new();
        batch.delete(vec![2, 1]);
        store.write_batch(batch).unwrap();

        assert_eq!(store.scan_prefix(&[2]).unwrap(), vec![(vec![2, 2], b"b".to_vec())]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_close() {
        let store = MemoryStore::new();
        store.put(b"key", b"value").unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.get(b"key"), Err(KVStoreError::Closed)));
        assert!(matches!(store.close(), Err(KVStoreError::Closed)));
    }
}
