//! # Router — Sharded Store Fan-Out
//!
//! Wraps N independent [`Store`] instances behind a key-hashed router to
//! reduce lock contention: each store carries its own reader/writer lock,
//! so writes to keys that hash to different shards proceed in parallel,
//! and reads never contend across shards.
//!
//! Shard `i` lives in the subdirectory `shard-<i>` under the root
//! directory. Routing is the 32-bit FNV-1a hash of the key modulo the
//! shard count, so a key always lands on the same shard for a given
//! count. There is no cross-key ordering guarantee across shards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use router::ShardedStore;
//!
//! let store = ShardedStore::open("data/ember", 4).unwrap();
//! store.put(b"hello", b"world").unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), b"world");
//! ```

pub use store::{Result, Store, StoreError};

use std::path::Path;

/// N independent stores behind one key-hashed front.
pub struct ShardedStore {
    shards: Vec<Store>,
}

impl ShardedStore {
    /// Opens (or creates) `num_shards` stores under `root`, one per
    /// `shard-<i>` subdirectory. A shard count of zero falls back to a
    /// single shard.
    ///
    /// The count must stay stable across restarts of the same root
    /// directory — routing depends on it.
    pub fn open<P: AsRef<Path>>(root: P, num_shards: usize) -> Result<Self> {
        let num_shards = num_shards.max(1);
        let root = root.as_ref();

        let mut shards = Vec::with_capacity(num_shards);
        for i in 0..num_shards {
            shards.push(Store::open(root.join(format!("shard-{}", i)))?);
        }
        Ok(Self { shards })
    }

    /// The store responsible for `key`.
    fn shard(&self, key: &[u8]) -> &Store {
        let idx = fnv1a_32(key) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Inserts or overwrites a key-value pair on the routed shard.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shard(key).put(key, value)
    }

    /// Looks up a key on the routed shard.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.shard(key).get(key)
    }

    /// Deletes a key on the routed shard.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.shard(key).delete(key)
    }

    /// Merges every shard, one at a time to bound disk I/O load.
    pub fn merge(&self) -> Result<()> {
        for shard in &self.shards {
            shard.merge()?;
        }
        Ok(())
    }

    /// Closes every shard. Each close is attempted; the first error
    /// encountered is returned.
    pub fn close(self) -> Result<()> {
        let mut first_err = None;
        for shard in self.shards {
            if let Err(e) = shard.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of shards behind this router.
    #[must_use]
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Total live keys across all shards.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.shards.iter().map(Store::key_count).sum()
    }

    /// Applies a rotation threshold to every shard.
    pub fn set_max_file_size(&self, size: u64) {
        for shard in &self.shards {
            shard.set_max_file_size(size);
        }
    }
}

/// 32-bit FNV-1a over the key bytes.
fn fnv1a_32(data: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
