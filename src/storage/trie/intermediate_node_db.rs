use std::sync::Arc;

use log::{debug, error, trace, warn};

use crate::config::TrieConfig;
use crate::storage::kv_store::{KVStore, KVStoreError, WriteBatchOperation, WriteBatchOperationExt};
use crate::storage::schema::Schema;
use crate::storage::trie::cache::{EvictionHandler, OnEvictCache};
use crate::storage::trie::error::MerkleError;
use crate::storage::trie::metrics::MerkleMetrics;
use crate::storage::trie::node::Node;
use crate::storage::trie::path::Path;

/// Cached entry for a path; `None` records that the node was deleted
type CachedNode = Option<Arc<Node>>;

// Close the backing store after a failure; its contents can no longer be trusted.
fn close_on_failure(store: &dyn KVStore, cause: &MerkleError) {
    if store.is_closed() {
        return;
    }
    error!("Closing backing store after failure: {}", cause);
    if let Err(e) = store.close() {
        warn!("Failed to close backing store: {}", e);
    }
}

/// Writes evicted intermediate nodes into a batch and commits it after
/// each eviction pass
struct NodeWriter {
    store: Arc<dyn KVStore>,
    write_batch: Vec<WriteBatchOperation>,
    metrics: Arc<dyn MerkleMetrics>,
}

impl NodeWriter {
    fn stage(&mut self, key: &Path, node: CachedNode) -> Result<(), MerkleError> {
        if self.store.is_closed() {
            return Err(MerkleError::KVStore(KVStoreError::Closed));
        }
        let prefixed_key = Schema::intermediate_node_key(key);
        match node {
            None => {
                trace!("Staging delete of intermediate node {}", key);
                self.write_batch.delete(prefixed_key);
            },
            Some(node) => {
                trace!("Staging write of intermediate node {}", key);
                let bytes = node.marshal()?;
                self.write_batch.put(prefixed_key, bytes.to_vec());
            },
        }
        Ok(())
    }
}

impl EvictionHandler<Path, CachedNode> for NodeWriter {
    type Error = MerkleError;

    fn size_of(&self, key: &Path, node: &CachedNode) -> usize {
        key.len() + node.as_ref().map_or(0, |n| n.size())
    }

    fn on_eviction(&mut self, key: Path, node: CachedNode) -> Result<(), MerkleError> {
        self.metrics.database_node_write();
        let result = self.stage(&key, node);
        if let Err(e) = &result {
            close_on_failure(self.store.as_ref(), e);
        }
        result
    }

    fn on_eviction_batch_finished(&mut self) -> Result<(), MerkleError> {
        let batch = std::mem::take(&mut self.write_batch);
        let count = batch.len();
        if let Err(e) = self.store.write_batch(batch) {
            let e = MerkleError::from(e);
            close_on_failure(self.store.as_ref(), &e);
            return Err(e);
        }
        debug!("Committed {} intermediate node writes", count);
        Ok(())
    }
}

/// Storage for intermediate nodes, i.e. those without values
///
/// Changes are held in a write-behind cache and only reach the backing store
/// when they are evicted or [`flush`](IntermediateNodeDb::flush) is called.
/// Keys in the backing store carry [`Schema::INTERMEDIATE_NODE_PREFIX`];
/// keys in the cache do not.
///
/// Any error from the backing store is fatal: the store is closed and the
/// error is returned.
pub struct IntermediateNodeDb {
    base_db: Arc<dyn KVStore>,
    node_cache: OnEvictCache<Path, CachedNode, NodeWriter>,
    metrics: Arc<dyn MerkleMetrics>,
}

impl IntermediateNodeDb {
    /// Create a new IntermediateNodeDb over `db`
    ///
    /// `size` is the cache budget in bytes and `eviction_batch_size` the
    /// number of bytes written to `db` per commit.
    pub fn new(
        db: Arc<dyn KVStore>,
        metrics: Arc<dyn MerkleMetrics>,
        size: usize,
        eviction_batch_size: usize,
    ) -> Self {
        let writer = NodeWriter {
            store: db.clone(),
            write_batch: Vec::new(),
            metrics: metrics.clone(),
        };
        Self {
            base_db: db,
            node_cache: OnEvictCache::new(size, eviction_batch_size, writer),
            metrics,
        }
    }

    /// Create a new IntermediateNodeDb with the cache budget from `config`
    pub fn from_config(db: Arc<dyn KVStore>, metrics: Arc<dyn MerkleMetrics>, config: &TrieConfig) -> Self {
        Self::new(
            db,
            metrics,
            config.intermediate_node_cache_size,
            config.eviction_batch_size,
        )
    }

    /// Get the node stored at `key`
    ///
    /// Returns `Ok(None)` if the node was deleted or was never stored. A
    /// node read from the backing store is not added to the cache.
    pub fn get(&self, key: &Path) -> Result<Option<Arc<Node>>, MerkleError> {
        if let Some(cached) = self.node_cache.get(key) {
            self.metrics.intermediate_node_cache_hit();
            return Ok(cached);
        }
        self.metrics.intermediate_node_cache_miss();

        let prefixed_key = Schema::intermediate_node_key(key);
        self.metrics.database_node_read();
        let node_bytes = match self.base_db.get(&prefixed_key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                let e = MerkleError::from(e);
                close_on_failure(self.base_db.as_ref(), &e);
                return Err(e);
            },
        };

        Node::parse(key.clone(), &node_bytes).map(|node| Some(Arc::new(node)))
    }

    /// Store `node` at `key`
    ///
    /// This may evict other nodes to the backing store; an error from that
    /// is fatal.
    pub fn put(&self, key: Path, node: Arc<Node>) -> Result<(), MerkleError> {
        self.node_cache.put(key, Some(node))
    }

    /// Delete the node at `key`
    ///
    /// The deletion is cached like a write and reaches the backing store
    /// when it is evicted.
    pub fn delete(&self, key: Path) -> Result<(), MerkleError> {
        self.node_cache.put(key, None)
    }

    /// Write every cached change to the backing store and empty the cache
    pub fn flush(&self) -> Result<(), MerkleError> {
        self.node_cache.flush()
    }

    /// Number of cached entries, deletions included
    pub fn cache_len(&self) -> usize {
        self.node_cache.len()
    }

    /// Total size of the cached entries
    pub fn cache_size(&self) -> usize {
        self.node_cache.current_size()
    }
}
