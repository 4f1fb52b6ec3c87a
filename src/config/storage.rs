use serde::{Serialize, Deserialize};

/// Backing store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path
    pub db_path: String,

    /// Create the database if it does not exist
    pub create_if_missing: bool,

    /// Maximum open files
    pub max_open_files: i32,

    /// Write buffer size in MB
    pub write_buffer_size: usize,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/merkledb/db".to_string(),
            create_if_missing: true,
            max_open_files: 1000,
            write_buffer_size: 64, // 64MB
            enable_compression: true,
        }
    }
}

impl StorageConfig {
    /// Check the storage section
    pub fn validate(&self) -> Result<(), String> {
        if self.db_path.is_empty() {
            return Err("storage.db_path must not be empty".to_string());
        }
        if self.write_buffer_size == 0 {
            return Err("storage.write_buffer_size must be positive".to_string());
        }
        Ok(())
    }
}
