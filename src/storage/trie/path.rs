use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::trie::error::MerkleError;

/// Nibble is a 4-bit value (0-15)
pub type Nibble = u8;

/// A key in the trie, as an ordered sequence of nibbles
///
/// Each nibble occupies one byte of the backing buffer, so comparing and
/// prefix-testing paths is plain slice work. The derived ordering is
/// lexicographic over nibbles.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SerializedPath", into = "SerializedPath")]
pub struct Path(Vec<Nibble>);

impl Path {
    /// The empty path, i.e. the root key
    pub fn empty() -> Self {
        Path(Vec::new())
    }

    /// Create a path from whole bytes
    ///
    /// Each byte is split into two nibbles, high nibble first.
    /// For example, the byte 0xAB becomes the nibbles 0xA and 0xB.
    pub fn new(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);

        for &byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }

        Path(nibbles)
    }

    /// Create a path from individual nibbles, rejecting values above 0xF
    pub fn from_nibbles(nibbles: Vec<Nibble>) -> Result<Self, MerkleError> {
        if let Some(bad) = nibbles.iter().find(|&&n| n > 0x0F) {
            return Err(MerkleError::InvalidPath(format!("Invalid nibble: {:#x}", bad)));
        }
        Ok(Path(nibbles))
    }

    /// Number of nibbles in the path
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the empty path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The nibbles of this path
    pub fn nibbles(&self) -> &[Nibble] {
        &self.0
    }

    /// The nibble at `index`
    ///
    /// Panics if `index` is out of bounds.
    pub fn nibble(&self, index: usize) -> Nibble {
        self.0[index]
    }

    /// Returns true iff this path begins with `prefix`
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns true iff `prefix` is a prefix of this path but not equal to it
    pub fn has_strict_prefix(&self, prefix: &Path) -> bool {
        self.has_prefix(prefix) && self.0.len() != prefix.0.len()
    }

    /// Returns a new path with `nibble` appended
    ///
    /// Panics if `nibble` is not a valid nibble.
    pub fn append(&self, nibble: Nibble) -> Path {
        assert!(nibble <= 0x0F, "Invalid nibble: {:#x}", nibble);
        let mut nibbles = Vec::with_capacity(self.0.len() + 1);
        nibbles.extend_from_slice(&self.0);
        nibbles.push(nibble);
        Path(nibbles)
    }

    /// The nibbles from `start` to the end of the path
    ///
    /// Returns the empty path when `start` is past the end.
    pub fn suffix(&self, start: usize) -> Path {
        Path(self.0.get(start..).map(<[Nibble]>::to_vec).unwrap_or_default())
    }

    /// This path followed by `nibble` and then `sub_path`
    pub fn join(&self, nibble: Nibble, sub_path: &Path) -> Path {
        assert!(nibble <= 0x0F, "Invalid nibble: {:#x}", nibble);
        let mut nibbles = Vec::with_capacity(self.0.len() + 1 + sub_path.0.len());
        nibbles.extend_from_slice(&self.0);
        nibbles.push(nibble);
        nibbles.extend_from_slice(&sub_path.0);
        Path(nibbles)
    }

    /// Pack the path into bytes for use as a storage key
    ///
    /// Every two nibbles are combined into a single byte. A trailing odd
    /// nibble lands in the high half of a final byte whose low half is zero,
    /// so `[0x1]` and `[0x1, 0x0]` pack to the same key. The result is not
    /// a reversible encoding; use [`Path::serialize`] for that.
    pub fn as_key(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.0.len() + 1) / 2);

        for chunk in self.0.chunks(2) {
            match chunk {
                [high, low] => bytes.push((high << 4) | low),
                [high] => bytes.push(high << 4),
                _ => unreachable!(),
            }
        }

        bytes
    }

    /// Reversible packed form carrying the nibble length
    pub fn serialize(&self) -> SerializedPath {
        SerializedPath {
            nibble_length: self.0.len(),
            value: self.as_key(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &nibble in &self.0 {
            write!(f, "{:x}", nibble)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self)
    }
}

/// Packed bytes of a path together with its nibble length
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPath {
    /// Number of nibbles in the path
    pub nibble_length: usize,
    /// Packed nibbles, as produced by [`Path::as_key`]
    pub value: Vec<u8>,
}

impl SerializedPath {
    /// Whether the path has an odd number of nibbles
    pub fn has_odd_length(&self) -> bool {
        self.nibble_length & 1 == 1
    }

    /// Unpack into a path
    pub fn deserialize(&self) -> Result<Path, MerkleError> {
        let expected_len = self.nibble_length / 2 + self.nibble_length % 2;
        if self.value.len() != expected_len {
            return Err(MerkleError::InvalidPath(format!(
                "{} bytes cannot hold {} nibbles",
                self.value.len(),
                self.nibble_length
            )));
        }
        if self.has_odd_length() {
            if let Some(last) = self.value.last() {
                if last & 0x0F != 0 {
                    return Err(MerkleError::InvalidPath(format!(
                        "Non-zero padding nibble in final byte {:#04x}",
                        last
                    )));
                }
            }
        }

        let mut nibbles = Path::new(&self.value).0;
        nibbles.truncate(self.nibble_length);
        Ok(Path(nibbles))
    }
}

impl From<Path> for SerializedPath {
    fn from(path: Path) -> Self {
        path.serialize()
    }
}

impl TryFrom<SerializedPath> for Path {
    type Error = MerkleError;

    fn try_from(serialized: SerializedPath) -> Result<Self, Self::Error> {
        serialized.deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn path(nibbles: &[u8]) -> Path {
        Path::from_nibbles(nibbles.to_vec()).unwrap()
    }

    #[test]
    fn test_new_splits_bytes() {
        let p = Path::new(&[240, 237]);
        assert_eq!(p.nibbles(), &[15, 0, 14, 13]);
        assert_eq!(p.to_string(), "f0ed");
    }

    #[test]
    fn test_append() {
        let p = Path::empty();
        assert_eq!(p.len(), 0);

        let p = p.append(1);
        assert_eq!(p.len(), 1);
        assert_eq!(p.nibble(0), 1);

        let p = p.append(2);
        assert_eq!(p.len(), 2);
        assert_eq!(p.nibble(1), 2);
    }

    #[test]
    fn test_has_prefix() {
        assert!(path(&[0, 1, 2, 3]).has_prefix(&path(&[0, 1, 2])));
        assert!(path(&[0, 1, 2, 3]).has_strict_prefix(&path(&[0, 1, 2])));

        assert!(path(&[0, 1, 2]).has_prefix(&path(&[0, 1, 2])));
        assert!(!path(&[0, 1, 2]).has_strict_prefix(&path(&[0, 1, 2])));

        assert!(!path(&[1, 2]).has_prefix(&path(&[1, 0])));
        assert!(!path(&[1, 2]).has_strict_prefix(&path(&[1, 0])));

        assert!(path(&[1, 2]).has_prefix(&path(&[1])));
        assert!(path(&[1, 2]).has_strict_prefix(&path(&[1])));

        assert!(Path::empty().has_prefix(&Path::empty()));
        assert!(!Path::empty().has_strict_prefix(&Path::empty()));
        assert!(path(&[3]).has_strict_prefix(&Path::empty()));
    }

    #[test]
    fn test_mutual_prefix_means_equal() {
        let paths = [
            Path::empty(),
            path(&[0]),
            path(&[0, 0]),
            path(&[1]),
            path(&[1, 2, 3]),
            path(&[1, 2, 4]),
        ];
        for p in &paths {
            for q in &paths {
                assert_eq!(p.has_prefix(q) && q.has_prefix(p), p == q, "{} vs {}", p, q);
            }
        }
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert_eq!(path(&[1, 2]).cmp(&path(&[1, 2])), Ordering::Equal);
        assert_eq!(path(&[1]).cmp(&path(&[1, 0])), Ordering::Less);
        assert_eq!(path(&[2]).cmp(&path(&[1, 15])), Ordering::Greater);
        assert_eq!(Path::empty().cmp(&path(&[0])), Ordering::Less);
    }

    #[test]
    fn test_as_key() {
        let bytes = vec![0x12, 0x34, 0xAB, 0xCD];
        assert_eq!(Path::new(&bytes).as_key(), bytes);
        assert_eq!(Path::empty().as_key(), Vec::<u8>::new());

        // Odd lengths pad the final byte with a zero low nibble
        assert_eq!(path(&[1, 2, 3]).as_key(), vec![0x12, 0x30]);
        assert_eq!(path(&[1]).as_key(), path(&[1, 0]).as_key());
    }

    #[test]
    fn test_as_key_inverts_new_for_whole_bytes() {
        for len in 0..8u8 {
            let bytes: Vec<u8> = (0..len).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
            assert_eq!(Path::new(&bytes).as_key(), bytes);
        }
    }

    #[test]
    fn test_suffix_and_join() {
        let p = path(&[1, 2, 3, 4]);
        assert_eq!(p.suffix(2), path(&[3, 4]));
        assert_eq!(p.suffix(4), Path::empty());
        assert_eq!(p.suffix(9), Path::empty());
        assert_eq!(path(&[1]).join(2, &path(&[3, 4])), p);
    }

    #[test]
    fn test_from_nibbles_rejects_bytes() {
        assert!(Path::from_nibbles(vec![1, 16]).is_err());
    }

    #[test]
    #[should_panic]
    fn test_append_rejects_bytes() {
        Path::empty().append(0x10);
    }

    #[test]
    fn test_serialized_path_preserves_parity() {
        let odd = path(&[1]);
        let even = path(&[1, 0]);
        assert_eq!(odd.serialize().value, even.serialize().value);
        assert_ne!(odd.serialize(), even.serialize());
        assert_eq!(odd.serialize().deserialize().unwrap(), odd);
        assert_eq!(even.serialize().deserialize().unwrap(), even);
    }

    #[test]
    fn test_serialized_path_validation() {
        let too_short = SerializedPath { nibble_length: 3, value: vec![0x12] };
        assert!(too_short.deserialize().is_err());

        let dirty_padding = SerializedPath { nibble_length: 1, value: vec![0x1F] };
        assert!(dirty_padding.deserialize().is_err());

        for nibble_length in [usize::MAX, usize::MAX - 1] {
            let huge = SerializedPath { nibble_length, value: Vec::new() };
            assert!(matches!(huge.deserialize(), Err(MerkleError::InvalidPath(_))));
        }
    }

    #[test]
    fn test_serde_goes_through_serialized_form() {
        let p = path(&[10, 11, 12]);
        let bytes = bincode::serialize(&p).unwrap();
        assert_eq!(bytes, bincode::serialize(&p.serialize()).unwrap());
        let decoded: Path = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, p);
    }
}
