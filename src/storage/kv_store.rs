use rocksdb::{DB, Options, WriteBatch, IteratorMode};
use std::path::Path;
use std::sync::RwLock;
use log::{error, info};

use crate::config::StorageConfig;

/// Error type for KVStore operations
#[derive(Debug, thiserror::Error)]
pub enum KVStoreError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDBError(String),

    /// Batch operation failed
    #[error("Batch operation failed: {0}")]
    BatchOperationFailed(String),

    /// The store was closed and no longer accepts operations
    #[error("Database closed")]
    Closed,
}

impl From<rocksdb::Error> for KVStoreError {
    fn from(err: rocksdb::Error) -> Self {
        KVStoreError::RocksDBError(err.to_string())
    }
}

/// Write batch operation for atomic updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBatchOperation {
    /// Put operation
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete operation
    Delete { key: Vec<u8> },
}

/// Extension trait for Vec<WriteBatchOperation>
pub trait WriteBatchOperationExt {
    /// Add a put operation to the batch
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Add a delete operation to the batch
    fn delete(&mut self, key: Vec<u8>);
}

impl WriteBatchOperationExt for Vec<WriteBatchOperation> {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.push(WriteBatchOperation::Put { key, value });
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.push(WriteBatchOperation::Delete { key });
    }
}

/// Key-value store trait
///
/// Once `close` has been called every other operation fails with
/// [`KVStoreError::Closed`].
pub trait KVStore: Send + Sync {
    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Delete a key-value pair
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Write a batch of operations atomically
    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError>;

    /// Iterate over key-value pairs with a prefix
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Flush any pending writes to disk
    fn flush(&self) -> Result<(), KVStoreError>;

    /// Close the store
    fn close(&self) -> Result<(), KVStoreError>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

/// RocksDB implementation of KVStore
pub struct RocksDBStore {
    /// RocksDB instance, dropped on close
    db: RwLock<Option<DB>>,
}

impl RocksDBStore {
    /// Create a new RocksDBStore
    pub fn new(path: &Path) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        Self::with_options(path, opts)
    }

    /// Create a new RocksDBStore with custom options
    pub fn with_options(path: &Path, options: Options) -> Result<Self, KVStoreError> {
        let db = DB::open(&options, path)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to open RocksDB: {}", e)))?;
        info!("Opened RocksDB at {:?}", path);
        Ok(Self { db: RwLock::new(Some(db)) })
    }

    /// Create a new RocksDBStore from the storage section of the configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size * 1024 * 1024);
        if config.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(rocksdb::DBCompressionType::None);
        }
        Self::with_options(Path::new(&config.db_path), opts)
    }

    fn with_db<T>(&self, f: impl FnOnce(&DB) -> Result<T, KVStoreError>) -> Result<T, KVStoreError> {
        let guard = self.db.read().unwrap();
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(KVStoreError::Closed),
        }
    }
}

impl KVStore for RocksDBStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.with_db(|db| {
            db.put(key, value)
                .map_err(|e| KVStoreError::RocksDBError(format!("Failed to put key: {}", e)))
        })
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.with_db(|db| {
            db.get(key)
                .map_err(|e| KVStoreError::RocksDBError(format!("Failed to get key: {}", e)))
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.with_db(|db| {
            db.delete(key)
                .map_err(|e| KVStoreError::RocksDBError(format!("Failed to delete key: {}", e)))
        })
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn write_batch(&self, operations: Vec<WriteBatchOperation>) -> Result<(), KVStoreError> {
        self.with_db(|db| {
            let mut batch = WriteBatch::default();

            for op in operations {
                match op {
                    WriteBatchOperation::Put { key, value } => {
                        batch.put(&key, &value);
                    },
                    WriteBatchOperation::Delete { key } => {
                        batch.delete(&key);
                    },
                }
            }

            db.write(batch)
                .map_err(|e| KVStoreError::BatchOperationFailed(format!("Failed to write batch: {}", e)))
        })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.with_db(|db| {
            let mut results = Vec::new();
            let iterator = db.iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));

            for item in iterator {
                let (key, value) = item
                    .map_err(|e| KVStoreError::RocksDBError(format!("Failed to iterate: {}", e)))?;

                if key.starts_with(prefix) {
                    results.push((key.to_vec(), value.to_vec()));
                } else {
                    // We've moved past the prefix
                    break;
                }
            }

            Ok(results)
        })
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        self.with_db(|db| {
            db.flush()
                .map_err(|e| KVStoreError::RocksDBError(format!("Failed to flush: {}", e)))
        })
    }

    fn close(&self) -> Result<(), KVStoreError> {
        let mut guard = self.db.write().unwrap();
        match guard.take() {
            Some(db) => {
                let result = db.flush();
                drop(db);
                if let Err(e) = result {
                    error!("Failed to flush RocksDB while closing: {}", e);
                    return Err(KVStoreError::RocksDBError(format!("Failed to flush on close: {}", e)));
                }
                info!("Closed RocksDB");
                Ok(())
            },
            None => Err(KVStoreError::Closed),
        }
    }

    fn is_closed(&self) -> bool {
        self.db.read().unwrap().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_basic_operations() {
        let temp_dir = tempdir().unwrap();
        let store = RocksDBStore::new(temp_dir.path()).unwrap();

        // Test put and get
        let key = b"test_key";
        let value = b"test_value";
        store.put(key, value).unwrap();

        let result = store.get(key).unwrap();
        assert_eq!(result, Some(value.to_vec()));

        // Test exists
        assert!(store.exists(key).unwrap());
        assert!(!store.exists(b"nonexistent_key").unwrap());

        // Test delete
        store.delete(key).unwrap();
        let result = store.get(key).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_batch_operations() {
        let temp_dir = tempdir().unwrap();
        let store = RocksDBStore::new(temp_dir.path()).unwrap();

        let mut batch = Vec::new();
        batch.put(b"key1".to_vec(), b"value1".to_vec());
        batch.put(b"key2".to_vec(), b"value2".to_vec());
        store.write_batch(batch).unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"key2").unwrap(), Some(b"value2".to_vec()));

        // Test batch with delete
        let mut batch = Vec::new();
        batch.delete(b"key1".to_vec());
        batch.put(b"key2".to_vec(), b"updated".to_vec());
        store.write_batch(batch).unwrap();

        assert_eq!(store.get(b"key1").unwrap(), None);
        assert_eq!(store.get(b"key2").unwrap(), Some(b"updated".to_vec()));
    }

    #[test]
    fn test_scan_prefix() {
        let temp_dir = tempdir().unwrap();
        let store = RocksDBStore::new(temp_dir.path()).unwrap();

        store.put(&[2, 0x10], b"value1").unwrap();
        store.put(&[2, 0x20], b"value2").unwrap();
        store.put(&[1, 0x10], b"meta").unwrap();
        store.put(&[3], b"other").unwrap();

        let results = store.scan_prefix(&[2]).unwrap();
        assert_eq!(results, vec![
            (vec![2, 0x10], b"value1".to_vec()),
            (vec![2, 0x20], b"value2".to_vec()),
        ]);
    }

    #[test]
    fn test_close_rejects_operations() {
        let temp_dir = tempdir().unwrap();
        let store = RocksDBStore::new(temp_dir.path()).unwrap();
        store.put(b"key", b"value").unwrap();

        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.get(b"key"), Err(KVStoreError::Closed)));
        assert!(matches!(store.write_batch(Vec::new()), Err(KVStoreError::Closed)));
        assert!(matches!(store.close(), Err(KVStoreError::Closed)));

        // Data written before close is durable
        let reopened = RocksDBStore::new(temp_dir.path()).unwrap();
        assert_eq!(reopened.get(b"key").unwrap(), Some(b"value".to_vec()));
    }
}
