use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::trie::codec;
use crate::storage::trie::error::MerkleError;
use crate::storage::trie::metrics::MerkleMetrics;
use crate::storage::trie::path::{Nibble, Path};
use crate::storage::trie::proof::ProofNode;
use crate::storage::trie::{Hash, EMPTY_HASH, HASH_LENGTH, NODE_BRANCH_FACTOR};

/// Fixed per-node overhead counted by [`Node::size`], on top of the key length
const NODE_OVERHEAD: usize = 1 + HASH_LENGTH + 4;

/// Reference from a node to one of its children
///
/// Only the skipped nibbles and the child's id are kept; the child node
/// itself is loaded separately by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Nibbles between the branch nibble and the child's key
    pub compressed_path: Path,
    /// Id of the child node
    pub id: Hash,
}

impl Child {
    fn size(&self) -> usize {
        1 + HASH_LENGTH + self.compressed_path.len()
    }
}

/// A vertex of the trie
///
/// The id and the storage encoding are computed on demand and memoized until
/// the next change to the value or children. Mutation takes `&mut self`, so
/// callers serialize changes to one node; the memo cells can be read from
/// many threads once set.
#[derive(Debug, Clone)]
pub struct Node {
    key: Path,
    value: Option<Arc<[u8]>>,
    children: BTreeMap<Nibble, Child>,
    value_digest: Option<Arc<[u8]>>,
    id: OnceCell<Hash>,
    node_bytes: OnceCell<Vec<u8>>,
    size: usize,
}

impl Node {
    /// Create a new node at `key` with no value and no children
    pub fn new(key: Path) -> Self {
        let size = NODE_OVERHEAD + key.len();
        Self {
            key,
            value: None,
            children: BTreeMap::new(),
            value_digest: None,
            id: OnceCell::new(),
            node_bytes: OnceCell::new(),
            size,
        }
    }

    /// Create a new node at `key` and register it as a child of `parent`
    pub fn new_child_of(parent: &mut Node, key: Path) -> Result<Self, MerkleError> {
        let node = Node::new(key);
        parent.add_child(&node)?;
        Ok(node)
    }

    /// Decode a node stored at `key`
    pub fn parse(key: Path, node_bytes: &[u8]) -> Result<Self, MerkleError> {
        let db_node = codec::decode_db_node(node_bytes)?;
        let value: Option<Arc<[u8]>> = db_node.value.map(Arc::from);
        let mut node = Self {
            key,
            value_digest: value_digest_of(&value),
            value,
            children: db_node.children,
            id: OnceCell::new(),
            node_bytes: OnceCell::with_value(node_bytes.to_vec()),
            size: 0,
        };
        node.size = node.compute_size();
        Ok(node)
    }

    /// Full key of this node
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Value stored at this node
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Returns true iff this node has a value
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// The value if shorter than a hash, otherwise the hash of the value
    pub fn value_digest(&self) -> Option<&[u8]> {
        self.value_digest.as_deref()
    }

    /// Children by branch nibble
    pub fn children(&self) -> &BTreeMap<Nibble, Child> {
        &self.children
    }

    /// The memoized id, if it has been calculated since the last change
    pub fn id(&self) -> Option<Hash> {
        self.id.get().copied()
    }

    /// Approximate in-memory size of this node in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Set the value of this node, or clear it with `None`
    pub fn set_value(&mut self, value: Option<Vec<u8>>) {
        self.on_node_changed();
        self.size -= self.value_size();
        self.value = value.map(Arc::from);
        self.value_digest = value_digest_of(&self.value);
        self.size += self.value_size();
    }

    /// Add `child` as a child of this node
    ///
    /// The branch nibble and compressed path are taken from the child's key,
    /// which must extend this node's key. The child's id is used if it has
    /// been calculated, otherwise the empty hash is recorded.
    pub fn add_child(&mut self, child: &Node) -> Result<(), MerkleError> {
        if !child.key.has_strict_prefix(&self.key) {
            return Err(MerkleError::InvalidChildKey {
                parent: self.key.to_string(),
                child: child.key.to_string(),
            });
        }
        let depth = self.key.len();
        self.add_child_without_node(
            child.key.nibble(depth),
            child.key.suffix(depth + 1),
            child.id().unwrap_or(EMPTY_HASH),
        )
    }

    /// Add a child entry without a reference to the child node
    ///
    /// Fails with [`MerkleError::InvalidNode`] if `index` is not a nibble.
    pub fn add_child_without_node(
        &mut self,
        index: Nibble,
        compressed_path: Path,
        child_id: Hash,
    ) -> Result<(), MerkleError> {
        if index as usize >= NODE_BRANCH_FACTOR {
            return Err(MerkleError::InvalidNode(format!("Invalid child index: {}", index)));
        }
        self.on_node_changed();
        let entry = Child { compressed_path, id: child_id };
        self.size += entry.size();
        if let Some(existing) = self.children.insert(index, entry) {
            self.size -= existing.size();
        }
        Ok(())
    }

    /// Remove `child` from this node's children
    ///
    /// Does nothing to the children if there is no entry at the child's
    /// branch nibble.
    pub fn remove_child(&mut self, child: &Node) {
        self.on_node_changed();
        if !child.key.has_strict_prefix(&self.key) {
            return;
        }
        let index = child.key.nibble(self.key.len());
        if let Some(existing) = self.children.remove(&index) {
            self.size -= existing.size();
        }
    }

    /// Full key of the only child of this node
    ///
    /// Returns `None` unless the node has exactly one child.
    pub fn single_child_path(&self) -> Option<Path> {
        if self.children.len() != 1 {
            return None;
        }
        self.children
            .iter()
            .next()
            .map(|(&index, entry)| self.key.join(index, &entry.compressed_path))
    }

    /// Returns and memoizes the id of this node
    pub fn calculate_id(&self, metrics: &dyn MerkleMetrics) -> Result<Hash, MerkleError> {
        let id = self.id.get_or_try_init(|| -> Result<Hash, MerkleError> {
            let bytes = codec::encode_hash_values(&self.children, self.value_digest(), &self.key)?;
            metrics.hash_calculated();
            let id: Hash = Sha256::digest(&bytes).into();
            trace!("Calculated id {} for node {}", hex::encode(id), self.key);
            Ok(id)
        })?;
        Ok(*id)
    }

    /// Returns and memoizes the storage encoding of this node
    pub fn marshal(&self) -> Result<&[u8], MerkleError> {
        self.node_bytes
            .get_or_try_init(|| codec::encode_db_node(self.value(), &self.children))
            .map(Vec::as_slice)
    }

    /// Project this node into its proof form
    pub fn as_proof_node(&self) -> ProofNode {
        ProofNode {
            key_path: self.key.serialize(),
            children: self
                .children
                .iter()
                .map(|(&index, entry)| (index, entry.id))
                .collect(),
            value_or_hash: self.value_digest().map(<[u8]>::to_vec),
        }
    }

    // Clear the values that have to be recalculated whenever the node changes
    fn on_node_changed(&mut self) {
        self.id = OnceCell::new();
        self.node_bytes = OnceCell::new();
    }

    fn value_size(&self) -> usize {
        match self.value.as_deref() {
            Some(value) if value.len() >= HASH_LENGTH => value.len() + HASH_LENGTH,
            Some(value) => value.len(),
            None => 0,
        }
    }

    fn compute_size(&self) -> usize {
        NODE_OVERHEAD
            + self.key.len()
            + self.value_size()
            + self.children.values().map(Child::size).sum::<usize>()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value && self.children == other.children
    }
}

impl Eq for Node {}

// Values shorter than a hash are their own digest.
fn value_digest_of(value: &Option<Arc<[u8]>>) -> Option<Arc<[u8]>> {
    match value {
        Some(v) if v.len() >= HASH_LENGTH => Some(Arc::from(Sha256::digest(v).as_slice())),
        other => other.clone(),
    }
}
