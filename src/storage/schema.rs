use crate::storage::trie::{MerkleError, Path};

/// Schema for backing store keys
///
/// Every trie record lives under a one-byte prefix so several kinds of
/// records can share one flat key-value store.
pub struct Schema;

impl Schema {
    /// Prefix for value-bearing nodes
    pub const VALUE_NODE_PREFIX: &'static [u8] = &[0];

    /// Prefix for trie metadata such as the root key
    pub const METADATA_PREFIX: &'static [u8] = &[1];

    /// Prefix for intermediate (value-less) nodes
    pub const INTERMEDIATE_NODE_PREFIX: &'static [u8] = &[2];

    /// Create a key for an intermediate node stored at `path`
    ///
    /// The path is written one nibble per byte, so paths of different
    /// lengths never share a key.
    pub fn intermediate_node_key(path: &Path) -> Vec<u8> {
        Self::prefixed_key(Self::INTERMEDIATE_NODE_PREFIX, path.nibbles())
    }

    /// Create a key for a value node stored at `path`
    pub fn value_node_key(path: &Path) -> Vec<u8> {
        Self::prefixed_key(Self::VALUE_NODE_PREFIX, path.nibbles())
    }

    /// Create a metadata key
    pub fn metadata_key(name: &[u8]) -> Vec<u8> {
        Self::prefixed_key(Self::METADATA_PREFIX, name)
    }

    /// Recover the path of an intermediate node from its store key
    pub fn intermediate_node_path(key: &[u8]) -> Result<Path, MerkleError> {
        let nibbles = key.strip_prefix(Self::INTERMEDIATE_NODE_PREFIX).ok_or_else(|| {
            MerkleError::InvalidPath(format!("Not an intermediate node key: {}", hex::encode(key)))
        })?;
        Path::from_nibbles(nibbles.to_vec())
    }

    fn prefixed_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
        let mut prefixed = Vec::with_capacity(prefix.len() + key.len());
        prefixed.extend_from_slice(prefix);
        prefixed.extend_from_slice(key);
        prefixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_keys() {
        let path = Path::new(&[0xAB, 0xCD]);
        assert_eq!(Schema::intermediate_node_key(&path), vec![2, 0xA, 0xB, 0xC, 0xD]);
        assert_eq!(Schema::value_node_key(&path), vec![0, 0xA, 0xB, 0xC, 0xD]);
        assert_eq!(Schema::metadata_key(b"root"), b"\x01root".to_vec());
    }

    #[test]
    fn test_odd_and_even_paths_have_distinct_keys() {
        let odd = Path::from_nibbles(vec![1]).unwrap();
        let even = Path::from_nibbles(vec![1, 0]).unwrap();
        assert_eq!(odd.as_key(), even.as_key());
        assert_ne!(Schema::intermediate_node_key(&odd), Schema::intermediate_node_key(&even));
        assert_eq!(Schema::intermediate_node_key(&Path::empty()), vec![2]);
    }

    #[test]
    fn test_intermediate_node_path() {
        for nibbles in [vec![], vec![1], vec![1, 0], vec![0xF, 0, 0xA]] {
            let path = Path::from_nibbles(nibbles).unwrap();
            let key = Schema::intermediate_node_key(&path);
            assert_eq!(Schema::intermediate_node_path(&key).unwrap(), path);
        }
        assert!(Schema::intermediate_node_path(&[1, 0x1]).is_err());
        assert!(Schema::intermediate_node_path(&[2, 0x10]).is_err());
    }
}
