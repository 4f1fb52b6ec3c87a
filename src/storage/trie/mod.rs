//! Merkle-Patricia trie storage for merkledb
//!
//! This module provides the building blocks of an authenticated trie: nibble
//! paths, nodes with memoized digests and encodings, and a write-behind cache
//! that persists intermediate nodes to a backing [`KVStore`](crate::storage::KVStore)
//! in batches.

pub mod cache;
pub mod codec;
pub mod error;
pub mod intermediate_node_db;
pub mod metrics;
pub mod node;
pub mod path;
pub mod proof;

/// Length in bytes of a node digest
pub const HASH_LENGTH: usize = 32;

/// Number of children a node can have, one per nibble
pub const NODE_BRANCH_FACTOR: usize = 16;

/// A 32-byte SHA-256 digest
pub type Hash = [u8; HASH_LENGTH];

/// Digest of a node whose id has not been computed yet
pub const EMPTY_HASH: Hash = [0u8; HASH_LENGTH];

// Re-export main components
pub use cache::{EvictionHandler, OnEvictCache};
pub use error::MerkleError;
pub use intermediate_node_db::IntermediateNodeDb;
pub use metrics::{MerkleMetrics, Metrics, MetricsSnapshot};
pub use node::{Child, Node};
pub use path::{Path, SerializedPath};
pub use proof::ProofNode;
