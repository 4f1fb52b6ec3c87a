use crate::storage::kv_store::KVStoreError;

/// Error type for trie storage operations
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    /// Backing store error
    #[error("KV store error: {0}")]
    KVStore(#[from] KVStoreError),

    /// Encoding or decoding error
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Malformed nibble path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Structurally invalid node
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// A child key that does not extend its parent's key
    #[error("Key {child} is not a child of {parent}")]
    InvalidChildKey { parent: String, child: String },
}
