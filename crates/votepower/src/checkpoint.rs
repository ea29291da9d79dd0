//! block-ordered checkpoint histories
//!
//! append-only (block, value) sequences with binary-search reads at any
//! past block and front-trimming below a cleanup boundary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, VotePowerError};
use crate::types::{Balance, BlockNumber};

/// one historical record: the value as of `block`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block: BlockNumber,
    pub value: Balance,
}

/// history of one scalar, strictly increasing in block number
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckpointHistory {
    entries: Vec<Checkpoint>,
}

impl CheckpointHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// append a checkpoint for `block`, overwriting the last entry when it
    /// is for the same block (writes within one block coalesce)
    pub fn write(&mut self, block: BlockNumber, value: Balance) {
        match self.entries.last_mut() {
            Some(last) if last.block == block => last.value = value,
            Some(last) => {
                debug_assert!(last.block < block, "checkpoint blocks must increase");
                self.entries.push(Checkpoint { block, value });
            }
            None => self.entries.push(Checkpoint { block, value }),
        }
    }

    /// latest value at or before `block`; zero if no entry that old exists
    pub fn value_at(&self, block: BlockNumber) -> Balance {
        let idx = self.entries.partition_point(|c| c.block <= block);
        if idx == 0 {
            0
        } else {
            self.entries[idx - 1].value
        }
    }

    /// latest value regardless of block
    pub fn value_now(&self) -> Balance {
        self.entries.last().map_or(0, |c| c.value)
    }

    /// discard entries strictly older than `boundary`, keeping at least one
    /// entry at or before it so reads at blocks >= boundary still resolve;
    /// returns the number of discarded entries
    pub fn trim(&mut self, boundary: BlockNumber) -> usize {
        let cut = self.entries.partition_point(|c| c.block < boundary);
        if cut == 0 {
            return 0;
        }
        let covered = self.entries.get(cut).is_some_and(|c| c.block == boundary);
        let drop = if covered { cut } else { cut - 1 };
        self.entries.drain(..drop);
        drop
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// keyed checkpoint histories sharing one cleanup boundary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointStore<K: Ord> {
    histories: BTreeMap<K, CheckpointHistory>,
    cleanup_block: BlockNumber,
}

impl<K: Ord> Default for CheckpointStore<K> {
    fn default() -> Self {
        Self {
            histories: BTreeMap::new(),
            cleanup_block: 0,
        }
    }
}

impl<K: Ord + Clone> CheckpointStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, key: K, block: BlockNumber, value: Balance) {
        self.histories.entry(key).or_default().write(block, value);
    }

    /// historical read; fails below the cleanup boundary, zero for keys
    /// with no history at or before `block`
    pub fn value_at(&self, key: &K, block: BlockNumber) -> Result<Balance> {
        self.check_boundary(block)?;
        Ok(self
            .histories
            .get(key)
            .map_or(0, |h| h.value_at(block)))
    }

    /// latest value, exempt from the cleanup boundary
    pub fn value_now(&self, key: &K) -> Balance {
        self.histories.get(key).map_or(0, |h| h.value_now())
    }

    pub fn check_boundary(&self, block: BlockNumber) -> Result<()> {
        if block < self.cleanup_block {
            return Err(VotePowerError::CleanedUpBlock {
                block,
                boundary: self.cleanup_block,
            });
        }
        Ok(())
    }

    pub fn cleanup_block(&self) -> BlockNumber {
        self.cleanup_block
    }

    /// advance the cleanup boundary; rejects backward moves and blocks not
    /// strictly in the past
    pub fn set_cleanup_block(&mut self, block: BlockNumber, current: BlockNumber) -> Result<()> {
        if block < self.cleanup_block {
            return Err(VotePowerError::CleanupBlockBackward {
                block,
                boundary: self.cleanup_block,
            });
        }
        if block >= current {
            return Err(VotePowerError::CleanupBlockNotPast { block, current });
        }
        self.cleanup_block = block;
        Ok(())
    }

    /// trim one key's history below `boundary`
    pub fn trim(&mut self, key: &K, boundary: BlockNumber) -> usize {
        self.histories.get_mut(key).map_or(0, |h| h.trim(boundary))
    }

    /// sweep every history below the store's own boundary, returning the
    /// total number of discarded checkpoints
    pub fn trim_all(&mut self) -> usize {
        let boundary = self.cleanup_block;
        let mut discarded = 0;
        for history in self.histories.values_mut() {
            discarded += history.trim(boundary);
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let mut h = CheckpointHistory::new();
        h.write(5, 100);
        h.write(10, 200);

        assert_eq!(h.value_at(4), 0);
        assert_eq!(h.value_at(5), 100);
        assert_eq!(h.value_at(7), 100);
        assert_eq!(h.value_at(10), 200);
        assert_eq!(h.value_at(999), 200);
        assert_eq!(h.value_now(), 200);
    }

    #[test]
    fn test_same_block_write_overwrites() {
        let mut h = CheckpointHistory::new();
        h.write(5, 100);
        h.write(5, 150);
        h.write(5, 120);

        assert_eq!(h.len(), 1);
        assert_eq!(h.value_at(5), 120);
    }

    #[test]
    fn test_trim_keeps_resolving_entry() {
        let mut h = CheckpointHistory::new();
        h.write(1, 10);
        h.write(5, 50);
        h.write(10, 100);

        // no entry at exactly block 7, so the block-5 entry must survive
        assert_eq!(h.trim(7), 1);
        assert_eq!(h.value_at(7), 50);
        assert_eq!(h.value_at(10), 100);
    }

    #[test]
    fn test_trim_with_exact_boundary_entry() {
        let mut h = CheckpointHistory::new();
        h.write(1, 10);
        h.write(5, 50);
        h.write(10, 100);

        // entry at exactly block 10 covers all reads >= 10
        assert_eq!(h.trim(10), 2);
        assert_eq!(h.len(), 1);
        assert_eq!(h.value_at(10), 100);
    }

    #[test]
    fn test_trim_empty_and_all_newer() {
        let mut h = CheckpointHistory::new();
        assert_eq!(h.trim(10), 0);

        h.write(20, 5);
        assert_eq!(h.trim(10), 0);
        assert_eq!(h.value_at(20), 5);
    }

    #[test]
    fn test_store_boundary_rejects_cleaned_reads() {
        let mut store: CheckpointStore<u8> = CheckpointStore::new();
        store.write(1, 5, 100);
        store.write(1, 10, 200);

        store.set_cleanup_block(10, 20).unwrap();
        assert!(matches!(
            store.value_at(&1, 9),
            Err(VotePowerError::CleanedUpBlock { .. })
        ));
        assert_eq!(store.value_at(&1, 10).unwrap(), 200);
        assert_eq!(store.value_now(&1), 200);
    }

    #[test]
    fn test_store_boundary_validation() {
        let mut store: CheckpointStore<u8> = CheckpointStore::new();
        store.set_cleanup_block(10, 20).unwrap();

        assert!(matches!(
            store.set_cleanup_block(5, 20),
            Err(VotePowerError::CleanupBlockBackward { .. })
        ));
        assert!(matches!(
            store.set_cleanup_block(20, 20),
            Err(VotePowerError::CleanupBlockNotPast { .. })
        ));
        assert!(matches!(
            store.set_cleanup_block(25, 20),
            Err(VotePowerError::CleanupBlockNotPast { .. })
        ));
    }

    #[test]
    fn test_store_trim_all() {
        let mut store: CheckpointStore<u8> = CheckpointStore::new();
        store.write(1, 1, 10);
        store.write(1, 5, 50);
        store.write(2, 2, 20);

        store.set_cleanup_block(5, 10).unwrap();
        let discarded = store.trim_all();
        assert_eq!(discarded, 1);
        assert_eq!(store.value_at(&1, 5).unwrap(), 50);
        assert_eq!(store.value_at(&2, 5).unwrap(), 20);
    }

    #[test]
    fn test_missing_key_reads_zero() {
        let store: CheckpointStore<u8> = CheckpointStore::new();
        assert_eq!(store.value_at(&9, 100).unwrap(), 0);
        assert_eq!(store.value_now(&9), 0);
    }
}
