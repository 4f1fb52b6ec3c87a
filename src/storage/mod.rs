// Storage module for merkledb
// Provides the backing key-value stores and the authenticated trie storage layer

pub mod kv_store;
pub mod memory_store;
pub mod schema;
pub mod trie;

// Re-export main components
pub use kv_store::{KVStore, KVStoreError, RocksDBStore, WriteBatchOperation, WriteBatchOperationExt};
pub use memory_store::MemoryStore;
pub use schema::Schema;
pub use trie::{IntermediateNodeDb, MerkleError, Node, Path};
