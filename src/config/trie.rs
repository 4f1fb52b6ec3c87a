use serde::{Serialize, Deserialize};

/// Trie configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrieConfig {
    /// Bytes of intermediate nodes held in memory before evicting to disk
    pub intermediate_node_cache_size: usize,

    /// Bytes of intermediate nodes written to disk per eviction batch
    pub eviction_batch_size: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            intermediate_node_cache_size: 64 * 1024 * 1024, // 64MB
            eviction_batch_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

impl TrieConfig {
    /// Check the trie section
    pub fn validate(&self) -> Result<(), String> {
        if self.intermediate_node_cache_size == 0 {
            return Err("trie.intermediate_node_cache_size must be positive".to_string());
        }
        if self.eviction_batch_size == 0 {
            return Err("trie.eviction_batch_size must be positive".to_string());
        }
        if self.eviction_batch_size > self.intermediate_node_cache_size {
            return Err(format!(
                "trie.eviction_batch_size ({}) must not exceed trie.intermediate_node_cache_size ({})",
                self.eviction_batch_size, self.intermediate_node_cache_size
            ));
        }
        Ok(())
    }
}
