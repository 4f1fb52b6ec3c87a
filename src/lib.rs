// merkledb - Authenticated Merkle-Patricia trie storage for blockchain state

pub mod config;
pub mod storage;

// Initialize logging
pub fn init_logger() {
    env_logger::init();
}
