//! historical vote power cache
//!
//! memoizes strictly-past vote power reads; once stored, an entry is served
//! forever, even after the cleanup boundary discards the source checkpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, VotePowerError};
use crate::types::{Address, Balance, BlockNumber};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VotePowerCache {
    by_account: BTreeMap<(Address, BlockNumber), Balance>,
    total: BTreeMap<BlockNumber, Balance>,
}

impl VotePowerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// cached vote power of one account at a strictly past block; the first
    /// call stores the computed value, later calls never recompute
    pub fn vote_power_of_at(
        &mut self,
        account: Address,
        block: BlockNumber,
        current: BlockNumber,
        compute: impl FnOnce() -> Result<Balance>,
    ) -> Result<Balance> {
        Self::require_past(block, current)?;
        if let Some(value) = self.by_account.get(&(account, block)) {
            return Ok(*value);
        }
        let value = compute()?;
        self.by_account.insert((account, block), value);
        Ok(value)
    }

    /// cached total vote power at a strictly past block
    pub fn total_vote_power_at(
        &mut self,
        block: BlockNumber,
        current: BlockNumber,
        compute: impl FnOnce() -> Result<Balance>,
    ) -> Result<Balance> {
        Self::require_past(block, current)?;
        if let Some(value) = self.total.get(&block) {
            return Ok(*value);
        }
        let value = compute()?;
        self.total.insert(block, value);
        Ok(value)
    }

    /// revocation write-through: adjust an already-cached entry so cached
    /// and uncached historical reads agree; absent entries are untouched
    /// (they will be computed post-revocation)
    pub fn adjust(&mut self, account: Address, block: BlockNumber, gained: Balance, lost: Balance) {
        if let Some(value) = self.by_account.get_mut(&(account, block)) {
            *value = (*value + gained).saturating_sub(lost);
        }
    }

    pub fn is_cached(&self, account: &Address, block: BlockNumber) -> bool {
        self.by_account.contains_key(&(*account, block))
    }

    fn require_past(block: BlockNumber, current: BlockNumber) -> Result<()> {
        if block >= current {
            return Err(VotePowerError::BlockNotPast { block, current });
        }
        Ok(())
    }
}
