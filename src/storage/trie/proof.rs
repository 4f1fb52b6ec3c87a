use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::trie::path::SerializedPath;
use crate::storage::trie::Hash;

/// Externally verifiable form of a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// Full key of the node
    pub key_path: SerializedPath,
    /// Child ids by branch nibble
    pub children: BTreeMap<u8, Hash>,
    /// The value if it is short, otherwise its hash
    pub value_or_hash: Option<Vec<u8>>,
}
