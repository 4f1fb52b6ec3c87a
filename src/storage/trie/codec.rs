//! Deterministic encodings for trie nodes
//!
//! Two encodings are defined:
//! - the storage encoding of a node's `{value, children}`, written to the
//!   backing store (the key is implied by the storage key);
//! - the hashing encoding of `{children, value digest, serialized key}`,
//!   whose SHA-256 is the node id.
//!
//! Both use bincode with varint integers, little endian byte order and
//! trailing bytes rejected. Children are held in a `BTreeMap`, so they are
//! always written in nibble order no matter how the node was built.

use std::collections::BTreeMap;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::storage::trie::error::MerkleError;
use crate::storage::trie::node::Child;
use crate::storage::trie::path::{Path, SerializedPath};
use crate::storage::trie::NODE_BRANCH_FACTOR;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
}

#[derive(Serialize)]
struct DbNodeRef<'a> {
    value: Option<&'a [u8]>,
    children: &'a BTreeMap<u8, Child>,
}

/// A node as decoded from the backing store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbNode {
    /// Value stored at the node, if any
    pub value: Option<Vec<u8>>,
    /// Children by branch nibble
    pub children: BTreeMap<u8, Child>,
}

#[derive(Serialize)]
struct HashValues<'a> {
    children: &'a BTreeMap<u8, Child>,
    value: Option<&'a [u8]>,
    key: SerializedPath,
}

/// Encode a node's value and children for storage
pub fn encode_db_node(
    value: Option<&[u8]>,
    children: &BTreeMap<u8, Child>,
) -> Result<Vec<u8>, MerkleError> {
    Ok(options().serialize(&DbNodeRef { value, children })?)
}

/// Decode a node's value and children from storage
pub fn decode_db_node(bytes: &[u8]) -> Result<DbNode, MerkleError> {
    let node: DbNode = options().deserialize(bytes)?;
    if let Some(index) = node.children.keys().find(|&&i| i as usize >= NODE_BRANCH_FACTOR) {
        return Err(MerkleError::InvalidNode(format!("Child index {} out of range", index)));
    }
    Ok(node)
}

/// Encode the inputs of a node id
pub fn encode_hash_values(
    children: &BTreeMap<u8, Child>,
    value_digest: Option<&[u8]>,
    key: &Path,
) -> Result<Vec<u8>, MerkleError> {
    Ok(options().serialize(&HashValues {
        children,
        value: value_digest,
        key: key.serialize(),
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(nibbles: &[u8], id: u8) -> Child {
        Child {
            compressed_path: Path::from_nibbles(nibbles.to_vec()).unwrap(),
            id: [id; 32],
        }
    }

    #[test]
    fn test_db_node_decodes_what_was_encoded() {
        let mut children = BTreeMap::new();
        children.insert(3, child(&[1, 2, 3], 7));
        children.insert(0, child(&[], 9));

        let bytes = encode_db_node(Some(b"value"), &children).unwrap();
        let decoded = decode_db_node(&bytes).unwrap();
        assert_eq!(decoded.value, Some(b"value".to_vec()));
        assert_eq!(decoded.children, children);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = BTreeMap::new();
        first.insert(1, child(&[4], 1));
        first.insert(9, child(&[5, 6], 2));

        let mut second = BTreeMap::new();
        second.insert(9, child(&[5, 6], 2));
        second.insert(1, child(&[4], 1));

        let key = Path::new(&[0xAB]);
        assert_eq!(
            encode_hash_values(&first, None, &key).unwrap(),
            encode_hash_values(&second, None, &key).unwrap()
        );
        assert_eq!(encode_db_node(None, &first).unwrap(), encode_db_node(None, &second).unwrap());
    }

    #[test]
    fn test_key_parity_changes_hash_encoding() {
        let children = BTreeMap::new();
        let odd = Path::from_nibbles(vec![1]).unwrap();
        let even = Path::from_nibbles(vec![1, 0]).unwrap();
        assert_ne!(
            encode_hash_values(&children, None, &odd).unwrap(),
            encode_hash_values(&children, None, &even).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_db_node(&[0xFF, 0xFF, 0xFF]).is_err());

        let bytes = encode_db_node(None, &BTreeMap::new()).unwrap();
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(decode_db_node(&trailing).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_path_length() {
        #[derive(Serialize)]
        struct RawChild {
            compressed_path: SerializedPath,
            id: [u8; 32],
        }

        #[derive(Serialize)]
        struct RawNode {
            value: Option<Vec<u8>>,
            children: BTreeMap<u8, RawChild>,
        }

        let mut children = BTreeMap::new();
        children.insert(
            2,
            RawChild {
                compressed_path: SerializedPath { nibble_length: usize::MAX, value: Vec::new() },
                id: [1; 32],
            },
        );
        let bytes = options().serialize(&RawNode { value: None, children }).unwrap();

        assert!(matches!(decode_db_node(&bytes), Err(MerkleError::Codec(_))));
    }

    #[test]
    fn test_decode_rejects_out_of_range_child() {
        let mut children = BTreeMap::new();
        children.insert(16, child(&[1], 1));
        let bytes = encode_db_node(None, &children).unwrap();
        assert!(matches!(decode_db_node(&bytes), Err(MerkleError::InvalidNode(_))));
    }
}
