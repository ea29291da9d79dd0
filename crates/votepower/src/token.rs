//! vote power token
//!
//! the owning entity: checkpointed balances and total supply, the block
//! clock, and the replaceable ledger front routing writes and reads to
//! ledger instances in its slab

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::VotePowerCache;
use crate::checkpoint::{CheckpointHistory, CheckpointStore};
use crate::delegation::DelegationMode;
use crate::error::{Result, VotePowerError};
use crate::ledger::VotePowerLedger;
use crate::types::{Address, Balance, Bips, BlockNumber, LedgerConfig, LedgerId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotePowerToken {
    owner: Address,
    cleanup_coordinator: Option<Address>,
    current_block: BlockNumber,
    balances: CheckpointStore<Address>,
    supply: CheckpointHistory,
    ledgers: Vec<VotePowerLedger>,
    write_ledger: Option<LedgerId>,
    read_ledger: Option<LedgerId>,
    had_write_ledger: bool,
    cache: VotePowerCache,
}

impl VotePowerToken {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            cleanup_coordinator: None,
            current_block: 1,
            balances: CheckpointStore::new(),
            supply: CheckpointHistory::new(),
            ledgers: Vec::new(),
            write_ledger: None,
            read_ledger: None,
            had_write_ledger: false,
            cache: VotePowerCache::new(),
        }
    }

    // --- block clock ---

    pub fn current_block(&self) -> BlockNumber {
        self.current_block
    }

    pub fn advance_block(&mut self, blocks: u64) {
        self.current_block += blocks;
    }

    // --- administrative api ---

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn require_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(VotePowerError::NotOwner);
        }
        Ok(())
    }

    /// designate an address allowed to trigger cleanup alongside the owner
    pub fn set_cleanup_coordinator(&mut self, caller: Address, coordinator: Address) -> Result<()> {
        self.require_owner(caller)?;
        if coordinator.is_zero() {
            return Err(VotePowerError::ZeroAddress);
        }
        self.cleanup_coordinator = Some(coordinator);
        info!(%coordinator, "cleanup coordinator set");
        Ok(())
    }

    pub fn cleanup_coordinator(&self) -> Option<Address> {
        self.cleanup_coordinator
    }

    pub fn require_cleanup_authority(&self, caller: Address) -> Result<()> {
        if caller == self.owner || self.cleanup_coordinator == Some(caller) {
            return Ok(());
        }
        Err(VotePowerError::NotCleanupAuthority)
    }

    /// create a ledger instance in the slab; a replacement instance becomes
    /// ready to take over writes once added here
    pub fn add_ledger(
        &mut self,
        caller: Address,
        config: LedgerConfig,
        replacement: bool,
    ) -> Result<LedgerId> {
        self.require_owner(caller)?;
        let mut ledger = VotePowerLedger::new(config, replacement);
        if replacement {
            ledger.configure_for_replacement();
        }
        let id = LedgerId(self.ledgers.len() as u32);
        self.ledgers.push(ledger);
        info!(%id, replacement, "ledger added");
        Ok(id)
    }

    /// route future balance and delegation writes to `id`; allowed for the
    /// first-ever write ledger, or for a replacement instance that has not
    /// yet received any write
    pub fn set_write_ledger(&mut self, caller: Address, id: LedgerId) -> Result<()> {
        self.require_owner(caller)?;
        let ledger = self.ledger(id)?;
        if self.had_write_ledger && !ledger.is_ready_for_replacement() {
            return Err(VotePowerError::NotConfiguredForReplacement);
        }
        self.write_ledger = Some(id);
        self.had_write_ledger = true;
        if self.read_ledger.is_none() {
            self.read_ledger = Some(id);
        }
        info!(%id, "write ledger set");
        Ok(())
    }

    /// route queries to `id`; deliberately permissive, so a replacement
    /// instance can serve reads as a preview before writes cut over
    pub fn set_read_ledger(&mut self, caller: Address, id: LedgerId) -> Result<()> {
        self.require_owner(caller)?;
        self.ledger(id)?;
        self.read_ledger = Some(id);
        info!(%id, "read ledger set");
        Ok(())
    }

    pub fn write_ledger_id(&self) -> Option<LedgerId> {
        self.write_ledger
    }

    pub fn read_ledger_id(&self) -> Option<LedgerId> {
        self.read_ledger
    }

    pub fn ledger(&self, id: LedgerId) -> Result<&VotePowerLedger> {
        self.ledgers
            .get(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))
    }

    pub fn ledger_mut(&mut self, id: LedgerId) -> Result<&mut VotePowerLedger> {
        self.ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))
    }

    // --- balance bookkeeping ---

    pub fn balance_of(&self, account: &Address) -> Balance {
        self.balances.value_now(account)
    }

    pub fn balance_of_at(&self, account: &Address, block: BlockNumber) -> Result<Balance> {
        self.balances.value_at(account, block)
    }

    pub fn total_supply(&self) -> Balance {
        self.supply.value_now()
    }

    pub fn mint(&mut self, caller: Address, to: Address, amount: Balance) -> Result<()> {
        self.require_owner(caller)?;
        if to.is_zero() {
            return Err(VotePowerError::ZeroAddress);
        }
        if amount == 0 {
            return Err(VotePowerError::ZeroAmount);
        }
        let old = self.balances.value_now(&to);
        self.update_balance(to, old, old + amount);
        self.supply
            .write(self.current_block, self.supply.value_now() + amount);
        Ok(())
    }

    pub fn burn(&mut self, caller: Address, amount: Balance) -> Result<()> {
        if amount == 0 {
            return Err(VotePowerError::ZeroAmount);
        }
        let old = self.balances.value_now(&caller);
        if old < amount {
            return Err(VotePowerError::InsufficientBalance {
                have: old,
                need: amount,
            });
        }
        self.check_explicit_lock(&caller, old - amount)?;
        self.update_balance(caller, old, old - amount);
        self.supply
            .write(self.current_block, self.supply.value_now() - amount);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<()> {
        if to.is_zero() {
            return Err(VotePowerError::ZeroAddress);
        }
        if amount == 0 {
            return Err(VotePowerError::ZeroAmount);
        }
        let from_old = self.balances.value_now(&from);
        if from_old < amount {
            return Err(VotePowerError::InsufficientBalance {
                have: from_old,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        self.check_explicit_lock(&from, from_old - amount)?;
        let to_old = self.balances.value_now(&to);
        self.update_balance(from, from_old, from_old - amount);
        self.update_balance(to, to_old, to_old + amount);
        Ok(())
    }

    /// a balance may not drop below the holder's outstanding explicit
    /// delegation total on the write ledger
    fn check_explicit_lock(&self, account: &Address, new_balance: Balance) -> Result<()> {
        let locked = self
            .write_ledger
            .and_then(|id| self.ledgers.get(id.0 as usize))
            .map_or(0, |ledger| ledger.explicit_outgoing_total(account));
        if new_balance < locked {
            return Err(VotePowerError::ExplicitTotalExceedsBalance {
                total: locked,
                balance: new_balance,
            });
        }
        Ok(())
    }

    /// write the balance checkpoint and feed the change to the write ledger
    fn update_balance(&mut self, account: Address, old: Balance, new: Balance) {
        let block = self.current_block;
        self.balances.write(account, block, new);
        if let Some(id) = self.write_ledger {
            if let Some(ledger) = self.ledgers.get_mut(id.0 as usize) {
                ledger.on_balance_changed(account, old, new, block);
            }
        }
    }

    // --- delegation write api (routed to the write ledger) ---

    pub fn delegate(&mut self, caller: Address, to: Address, bips: Bips) -> Result<()> {
        let id = self.write_ledger.ok_or(VotePowerError::NoWriteLedger)?;
        let block = self.current_block;
        let balances = &self.balances;
        let ledger = self
            .ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        ledger.delegate(caller, to, bips, block, balances)
    }

    pub fn delegate_explicit(&mut self, caller: Address, to: Address, amount: Balance) -> Result<()> {
        let id = self.write_ledger.ok_or(VotePowerError::NoWriteLedger)?;
        let block = self.current_block;
        let balances = &self.balances;
        let ledger = self
            .ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        ledger.delegate_explicit(caller, to, amount, block, balances)
    }

    pub fn undelegate_all(&mut self, caller: Address) -> Result<()> {
        let id = self.write_ledger.ok_or(VotePowerError::NoWriteLedger)?;
        let block = self.current_block;
        let balances = &self.balances;
        let ledger = self
            .ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        ledger.undelegate_all(caller, block, balances)
    }

    pub fn undelegate_all_explicit(&mut self, caller: Address, targets: &[Address]) -> Result<()> {
        let id = self.write_ledger.ok_or(VotePowerError::NoWriteLedger)?;
        let block = self.current_block;
        let ledger = self
            .ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        ledger.undelegate_all_explicit(caller, targets, block)
    }

    /// retroactively zero the caller's edge to `to` at one past block,
    /// writing through any cached values for that block
    pub fn revoke_delegation_at(
        &mut self,
        caller: Address,
        to: Address,
        block: BlockNumber,
    ) -> Result<()> {
        let id = self.write_ledger.ok_or(VotePowerError::NoWriteLedger)?;
        let current = self.current_block;
        let balances = &self.balances;
        let ledger = self
            .ledgers
            .get_mut(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        let amount = ledger.revoke_delegation_at(caller, to, block, current, balances)?;
        if amount > 0 {
            self.cache.adjust(caller, block, amount, 0);
            self.cache.adjust(to, block, 0, amount);
        }
        Ok(())
    }

    // --- read api (routed to the read ledger) ---

    pub fn vote_power_of(&self, account: &Address) -> Result<Balance> {
        Ok(self.read()?.vote_power_of(account, &self.balances))
    }

    pub fn vote_power_of_at(&self, account: &Address, block: BlockNumber) -> Result<Balance> {
        self.read()?.vote_power_of_at(account, block, &self.balances)
    }

    pub fn undelegated_vote_power_of(&self, account: &Address) -> Result<Balance> {
        Ok(self.read()?.undelegated_vote_power_of(account, &self.balances))
    }

    pub fn undelegated_vote_power_of_at(
        &self,
        account: &Address,
        block: BlockNumber,
    ) -> Result<Balance> {
        self.read()?
            .undelegated_vote_power_of_at(account, block, &self.balances)
    }

    pub fn vote_power_from_to(&self, from: &Address, to: &Address) -> Result<Balance> {
        Ok(self.read()?.vote_power_from_to(from, to, &self.balances))
    }

    pub fn vote_power_from_to_at(
        &self,
        from: &Address,
        to: &Address,
        block: BlockNumber,
    ) -> Result<Balance> {
        self.read()?
            .vote_power_from_to_at(from, to, block, &self.balances)
    }

    pub fn batch_vote_power_of_at(
        &self,
        accounts: &[Address],
        block: BlockNumber,
    ) -> Result<Vec<Balance>> {
        self.read()?
            .batch_vote_power_of_at(accounts, block, self.current_block, &self.balances)
    }

    pub fn delegation_mode_of(&self, account: &Address) -> Result<DelegationMode> {
        Ok(self.read()?.mode_of(account))
    }

    pub fn delegates_of(&self, account: &Address) -> Result<Vec<(Address, Bips)>> {
        self.read()?.delegates_of(account)
    }

    pub fn delegates_of_at(
        &self,
        account: &Address,
        block: BlockNumber,
    ) -> Result<Vec<(Address, Bips)>> {
        self.read()?.delegates_of_at(account, block)
    }

    /// total vote power equals total supply: delegation redistributes
    /// weight without changing it
    pub fn total_vote_power(&self) -> Balance {
        self.supply.value_now()
    }

    pub fn total_vote_power_at(&self, block: BlockNumber) -> Result<Balance> {
        self.balances.check_boundary(block)?;
        Ok(self.supply.value_at(block))
    }

    // --- cached reads ---

    pub fn vote_power_of_at_cached(
        &mut self,
        account: Address,
        block: BlockNumber,
    ) -> Result<Balance> {
        let id = self.read_ledger.ok_or(VotePowerError::NoReadLedger)?;
        let ledger = self
            .ledgers
            .get(id.0 as usize)
            .ok_or(VotePowerError::UnknownLedger(id))?;
        let balances = &self.balances;
        self.cache
            .vote_power_of_at(account, block, self.current_block, || {
                ledger.vote_power_of_at(&account, block, balances)
            })
    }

    pub fn total_vote_power_at_cached(&mut self, block: BlockNumber) -> Result<Balance> {
        let supply = &self.supply;
        let balances = &self.balances;
        self.cache.total_vote_power_at(block, self.current_block, || {
            balances.check_boundary(block)?;
            Ok(supply.value_at(block))
        })
    }

    // --- cleanup targets ---

    pub fn cleanup_block(&self) -> BlockNumber {
        self.balances.cleanup_block()
    }

    /// advance the boundary of the token-owned balance history and trim it
    pub fn trim_balances(&mut self, boundary: BlockNumber) -> Result<usize> {
        self.balances.set_cleanup_block(boundary, self.current_block)?;
        Ok(self.balances.trim_all() + self.supply.trim(boundary))
    }

    /// advance one ledger instance's boundary and trim its history
    pub fn trim_ledger(&mut self, id: LedgerId, boundary: BlockNumber) -> Result<usize> {
        let current = self.current_block;
        let ledger = self.ledger_mut(id)?;
        ledger.set_cleanup_block(boundary, current)?;
        Ok(ledger.trim_history())
    }

    fn read(&self) -> Result<&VotePowerLedger> {
        let id = self.read_ledger.ok_or(VotePowerError::NoReadLedger)?;
        self.ledger(id)
    }
}
