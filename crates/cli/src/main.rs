//! # CLI - EmberKV Interactive Shell
//!
//! A REPL-style command-line interface for the EmberKV store. Reads
//! commands from stdin, executes them against a sharded store, and prints
//! results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (writes a tombstone)
//! MERGE              Compact immutable segments on every shard
//! STATS              Print store debug info
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! EMBER_DIR          Store root directory       (default: "data/ember")
//! EMBER_SHARDS       Shard count                (default: 1)
//! EMBER_MAX_FILE_KB  Rotation threshold in KiB  (default: 10240 = 10 MiB)
//! RUST_LOG           Log filter                 (default: "info")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! EmberKV started (dir=data/ember, shards=1, keys=0, max_file=10240KiB)
//! > SET name Alice
//! OK
//! > GET name
//! Alice
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use router::{ShardedStore, StoreError};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let dir = env_or("EMBER_DIR", "data/ember");
    let shards: usize = env_or("EMBER_SHARDS", "1").parse().unwrap_or(1);
    let max_file_kb: u64 = env_or("EMBER_MAX_FILE_KB", "10240").parse().unwrap_or(10240);

    let store = ShardedStore::open(&dir, shards)?;
    store.set_max_file_size(max_file_kb * 1024);

    println!(
        "EmberKV started (dir={}, shards={}, keys={}, max_file={}KiB)",
        dir,
        store.num_shards(),
        store.key_count(),
        max_file_kb
    );
    println!("Commands: SET key value | GET key | DEL key | MERGE | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: SET key value");
                        } else {
                            match store.put(k.as_bytes(), v.as_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR set failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match store.get(k.as_bytes()) {
                            Ok(v) => println!("{}", String::from_utf8_lossy(&v)),
                            Err(StoreError::KeyNotFound) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        match store.delete(k.as_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR delete failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "MERGE" => match store.merge() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR merge failed: {}", e),
                },
                "STATS" => {
                    println!("shards={} keys={}", store.num_shards(), store.key_count());
                }
                "EXIT" | "QUIT" => break,
                other => println!("ERR unknown command: {}", other),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    store.close()?;
    println!("bye");
    Ok(())
}
