use std::path::{Path, PathBuf};
use std::process;
use structopt::StructOpt;
use log::{error, info};

use merkledb::config::Config;
use merkledb::init_logger;
use merkledb::storage::trie::codec::decode_db_node;
use merkledb::storage::{KVStore, RocksDBStore, Schema};

#[derive(Debug, StructOpt)]
#[structopt(name = "merkledb", about = "Merkle trie storage tool")]
enum Opt {
    /// Write a default configuration file
    GenerateConfig {
        /// Output file
        #[structopt(long, parse(from_os_str), default_value = "merkledb.toml")]
        output: PathBuf,
    },

    /// Print every persisted intermediate node
    Dump {
        /// Configuration file
        #[structopt(long, parse(from_os_str), default_value = "merkledb.toml")]
        config: PathBuf,
    },

    /// Count persisted intermediate nodes
    Stats {
        /// Configuration file
        #[structopt(long, parse(from_os_str), default_value = "merkledb.toml")]
        config: PathBuf,
    },
}

fn open_store(config_path: &Path) -> Result<RocksDBStore, String> {
    let config = Config::load(config_path)?;
    RocksDBStore::from_config(&config.storage).map_err(|e| e.to_string())
}

fn dump(config_path: &Path) -> Result<(), String> {
    let store = open_store(config_path)?;
    let records = store
        .scan_prefix(Schema::INTERMEDIATE_NODE_PREFIX)
        .map_err(|e| e.to_string())?;

    for (key, bytes) in &records {
        let path = Schema::intermediate_node_path(key).map_err(|e| e.to_string())?;
        let node = decode_db_node(bytes).map_err(|e| format!("Node [{}]: {}", path, e))?;

        let value = node.value.as_ref().map_or("-".to_string(), hex::encode);
        println!("[{}] ({} nibbles) value={}", path, path.len(), value);
        for (index, child) in &node.children {
            println!("  [{:x}] +{} {}", index, child.compressed_path, hex::encode(child.id));
        }
    }

    info!("Dumped {} intermediate nodes", records.len());
    store.close().map_err(|e| e.to_string())
}

fn stats(config_path: &Path) -> Result<(), String> {
    let store = open_store(config_path)?;
    let records = store
        .scan_prefix(Schema::INTERMEDIATE_NODE_PREFIX)
        .map_err(|e| e.to_string())?;

    let total_bytes: usize = records.iter().map(|(key, value)| key.len() + value.len()).sum();
    println!("intermediate nodes: {}", records.len());
    println!("total bytes: {}", total_bytes);
    store.close().map_err(|e| e.to_string())
}

fn main() {
    init_logger();

    let result = match Opt::from_args() {
        Opt::GenerateConfig { output } => Config::generate_default(&output),
        Opt::Dump { config } => dump(&config),
        Opt::Stats { config } => stats(&config),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
