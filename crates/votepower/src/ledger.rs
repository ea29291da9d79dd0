//! vote power ledger instance
//!
//! owns the delegation state and the checkpointed delegated-out /
//! delegated-in aggregates of every account; balance history is owned by
//! the token and passed in by reference, so it survives ledger replacement

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::checkpoint::CheckpointStore;
use crate::delegation::{bips_share, DelegationMode, DelegationState};
use crate::error::{Result, VotePowerError};
use crate::types::{Address, Balance, Bips, BlockNumber, LedgerConfig, MAX_BIPS};

/// replacement lifecycle of one ledger instance
///
/// `Fresh { replacement: false }` activates on first write;
/// `Fresh { replacement: true }` must be configured on a token first, then
/// its first write consumes the readiness
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerLifecycle {
    Fresh { replacement: bool },
    ReadyForReplacement,
    Active,
}

/// net vote power adjustment recorded by a historical revocation,
/// keyed by (account, block)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RevocationAdjustment {
    gained: Balance,
    lost: Balance,
}

/// checkpointed active-delegate list of one percentage delegator; each
/// entry holds at most the configured edge cap
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DelegateListHistory {
    entries: Vec<(BlockNumber, Vec<Address>)>,
}

impl DelegateListHistory {
    fn write(&mut self, block: BlockNumber, delegates: Vec<Address>) {
        match self.entries.last_mut() {
            Some((last, list)) if *last == block => *list = delegates,
            _ => self.entries.push((block, delegates)),
        }
    }

    fn at(&self, block: BlockNumber) -> &[Address] {
        let idx = self.entries.partition_point(|(b, _)| *b <= block);
        if idx == 0 {
            &[]
        } else {
            &self.entries[idx - 1].1
        }
    }

    fn trim(&mut self, boundary: BlockNumber) -> usize {
        let cut = self.entries.partition_point(|(b, _)| *b < boundary);
        if cut == 0 {
            return 0;
        }
        let covered = self.entries.get(cut).is_some_and(|(b, _)| *b == boundary);
        let drop = if covered { cut } else { cut - 1 };
        self.entries.drain(..drop);
        drop
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotePowerLedger {
    config: LedgerConfig,
    lifecycle: LedgerLifecycle,
    delegations: BTreeMap<Address, DelegationState>,
    /// amount-equivalent outgoing delegation per delegator
    delegated_out: CheckpointStore<Address>,
    /// amount-equivalent incoming delegation per delegatee
    delegated_in: CheckpointStore<Address>,
    /// per-edge history: bips in percentage mode, nominal amount in amount mode
    edges: CheckpointStore<(Address, Address)>,
    /// per-delegator checkpointed percentage delegate lists
    delegate_lists: BTreeMap<Address, DelegateListHistory>,
    revocation_adjustments: BTreeMap<(Address, BlockNumber), RevocationAdjustment>,
    revoked: BTreeSet<(Address, Address, BlockNumber)>,
}

impl VotePowerLedger {
    pub fn new(config: LedgerConfig, replacement: bool) -> Self {
        Self {
            config,
            lifecycle: LedgerLifecycle::Fresh { replacement },
            delegations: BTreeMap::new(),
            delegated_out: CheckpointStore::new(),
            delegated_in: CheckpointStore::new(),
            edges: CheckpointStore::new(),
            delegate_lists: BTreeMap::new(),
            revocation_adjustments: BTreeMap::new(),
            revoked: BTreeSet::new(),
        }
    }

    // --- lifecycle ---

    pub fn lifecycle(&self) -> LedgerLifecycle {
        self.lifecycle
    }

    /// bind a replacement instance to its owning token
    pub fn configure_for_replacement(&mut self) {
        if let LedgerLifecycle::Fresh { replacement: true } = self.lifecycle {
            self.lifecycle = LedgerLifecycle::ReadyForReplacement;
        }
    }

    pub fn is_ready_for_replacement(&self) -> bool {
        self.lifecycle == LedgerLifecycle::ReadyForReplacement
    }

    fn note_write(&mut self) {
        self.lifecycle = LedgerLifecycle::Active;
    }

    // --- balance feed ---

    /// balance change hook; in percentage mode the delegated amounts follow
    /// the balance, bounded by the percentage edge cap, while amount-mode
    /// edges are absolute and stay untouched
    pub fn on_balance_changed(
        &mut self,
        account: Address,
        old_balance: Balance,
        new_balance: Balance,
        block: BlockNumber,
    ) {
        self.note_write();
        let Some(DelegationState::Percentage(pd)) = self.delegations.get(&account) else {
            return;
        };
        let edges: Vec<_> = pd.edges().to_vec();
        let mut out_total = 0;
        for edge in &edges {
            let old_amount = bips_share(old_balance, edge.bips);
            let new_amount = bips_share(new_balance, edge.bips);
            if old_amount != new_amount {
                let incoming = self.delegated_in.value_now(&edge.to);
                self.delegated_in
                    .write(edge.to, block, incoming - old_amount + new_amount);
            }
            out_total += new_amount;
        }
        self.delegated_out.write(account, block, out_total);
    }

    // --- delegation write api ---

    /// add, replace, or remove (bips == 0) a percentage-mode edge
    pub fn delegate(
        &mut self,
        from: Address,
        to: Address,
        bips: Bips,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<()> {
        Self::validate_target(&from, &to)?;
        if bips > MAX_BIPS {
            return Err(VotePowerError::BipsOutOfRange(bips));
        }
        let was_not_set = self.mode_of(&from) == DelegationMode::NotSet;
        if bips == 0 && was_not_set {
            // removing a never-created edge is the documented no-op
            return Ok(());
        }

        let max = self.config.max_delegates_by_percent;
        let state = self.delegations.entry(from).or_default();
        let pd = state.as_percentage()?;
        let old_bips = match pd.set_edge(to, bips, max) {
            Ok(old) => old,
            Err(e) => {
                // the whole call aborts, including the mode transition
                if was_not_set {
                    self.delegations.remove(&from);
                }
                return Err(e);
            }
        };
        if old_bips == bips {
            return Ok(());
        }
        let delegates: Vec<Address> = pd.edges().iter().map(|e| e.to).collect();
        self.note_write();

        let balance = balances.value_now(&from);
        let old_amount = bips_share(balance, old_bips);
        let new_amount = bips_share(balance, bips);
        self.edges.write((from, to), block, bips as Balance);
        self.delegate_lists
            .entry(from)
            .or_default()
            .write(block, delegates);
        self.apply_edge_delta(from, to, old_amount, new_amount, block);
        debug!(%from, %to, bips, block, "percentage delegation updated");
        Ok(())
    }

    /// add, replace, or remove (amount == 0) an amount-mode edge; the
    /// outstanding nominal total must stay within the delegator's balance
    pub fn delegate_explicit(
        &mut self,
        from: Address,
        to: Address,
        amount: Balance,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<()> {
        Self::validate_target(&from, &to)?;
        let was_not_set = self.mode_of(&from) == DelegationMode::NotSet;
        if amount == 0 && was_not_set {
            return Ok(());
        }

        let state = self.delegations.entry(from).or_default();
        let ed = state.as_amount()?;
        let old = ed.amount_of(&to);
        if old == amount {
            return Ok(());
        }
        let total = ed.total() - old + amount;
        let balance = balances.value_now(&from);
        if total > balance {
            // the whole call aborts, including the mode transition
            if was_not_set {
                self.delegations.remove(&from);
            }
            return Err(VotePowerError::ExplicitTotalExceedsBalance { total, balance });
        }
        ed.set_edge(to, amount);
        self.note_write();

        self.edges.write((from, to), block, amount);
        self.apply_edge_delta(from, to, old, amount, block);
        debug!(%from, %to, amount, block, "explicit delegation updated");
        Ok(())
    }

    /// clear every percentage-mode edge; no-op when the mode was never set
    pub fn undelegate_all(
        &mut self,
        from: Address,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<()> {
        let Some(state) = self.delegations.get_mut(&from) else {
            return Ok(());
        };
        let pd = match state {
            DelegationState::NotSet => return Ok(()),
            DelegationState::Amount(_) => {
                return Err(VotePowerError::ModeConflict {
                    active: DelegationMode::Amount,
                })
            }
            DelegationState::Percentage(pd) => pd,
        };
        let cleared = pd.clear();
        if cleared.is_empty() {
            return Ok(());
        }
        self.note_write();
        let balance = balances.value_now(&from);
        for edge in cleared {
            let recorded = bips_share(balance, edge.bips);
            self.edges.write((from, edge.to), block, 0);
            self.apply_edge_delta(from, edge.to, recorded, 0, block);
        }
        self.delegate_lists
            .entry(from)
            .or_default()
            .write(block, Vec::new());
        debug!(%from, block, "all percentage delegations removed");
        Ok(())
    }

    /// clear the listed amount-mode edges; the caller supplies the targets
    /// because amount-mode edges are not enumerable
    pub fn undelegate_all_explicit(
        &mut self,
        from: Address,
        targets: &[Address],
        block: BlockNumber,
    ) -> Result<()> {
        let Some(state) = self.delegations.get_mut(&from) else {
            return Ok(());
        };
        let ed = match state {
            DelegationState::NotSet => return Ok(()),
            DelegationState::Percentage(_) => {
                return Err(VotePowerError::ModeConflict {
                    active: DelegationMode::Percentage,
                })
            }
            DelegationState::Amount(ed) => ed,
        };
        let mut removed = Vec::new();
        for to in targets {
            let old = ed.set_edge(*to, 0);
            if old > 0 {
                removed.push((*to, old));
            }
        }
        if removed.is_empty() {
            return Ok(());
        }
        self.note_write();
        for (to, old) in removed {
            self.edges.write((from, to), block, 0);
            self.apply_edge_delta(from, to, old, 0, block);
        }
        debug!(%from, block, targets = targets.len(), "explicit delegations removed");
        Ok(())
    }

    /// retroactively zero one edge for one strictly past block; silently
    /// succeeds when no edge existed there, fails on a second revocation of
    /// the same (from, to, block); returns the revoked amount
    pub fn revoke_delegation_at(
        &mut self,
        from: Address,
        to: Address,
        block: BlockNumber,
        current_block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Balance> {
        if to.is_zero() {
            return Err(VotePowerError::ZeroAddress);
        }
        if block >= current_block {
            return Err(VotePowerError::RevokeOnlyPast);
        }
        let amount = self.edge_value_at(&from, &to, block, balances)?;
        if amount == 0 {
            return Ok(0);
        }
        if !self.revoked.insert((from, to, block)) {
            return Err(VotePowerError::AlreadyRevoked);
        }
        let delegator = self
            .revocation_adjustments
            .entry((from, block))
            .or_default();
        delegator.gained += amount;
        let delegatee = self.revocation_adjustments.entry((to, block)).or_default();
        delegatee.lost += amount;
        debug!(%from, %to, block, amount, "delegation revoked");
        Ok(amount)
    }

    // --- read api ---

    pub fn mode_of(&self, account: &Address) -> DelegationMode {
        self.delegations
            .get(account)
            .map_or(DelegationMode::NotSet, |s| s.mode())
    }

    pub fn vote_power_of(&self, account: &Address, balances: &CheckpointStore<Address>) -> Balance {
        let balance = balances.value_now(account);
        let out = self.delegated_out.value_now(account);
        let incoming = self.delegated_in.value_now(account);
        balance - balance.min(out) + incoming
    }

    pub fn vote_power_of_at(
        &self,
        account: &Address,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Balance> {
        let balance = balances.value_at(account, block)?;
        let out = self.delegated_out.value_at(account, block)?;
        let incoming = self.delegated_in.value_at(account, block)?;
        let mut power = balance - balance.min(out) + incoming;
        if let Some(adj) = self.revocation_adjustments.get(&(*account, block)) {
            power = (power + adj.gained).saturating_sub(adj.lost);
        }
        Ok(power)
    }

    pub fn undelegated_vote_power_of(
        &self,
        account: &Address,
        balances: &CheckpointStore<Address>,
    ) -> Balance {
        let balance = balances.value_now(account);
        balance - balance.min(self.delegated_out.value_now(account))
    }

    pub fn undelegated_vote_power_of_at(
        &self,
        account: &Address,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Balance> {
        let balance = balances.value_at(account, block)?;
        let out = self.delegated_out.value_at(account, block)?;
        Ok(balance - balance.min(out))
    }

    /// current value of one specific edge; zero if it never existed
    pub fn vote_power_from_to(
        &self,
        from: &Address,
        to: &Address,
        balances: &CheckpointStore<Address>,
    ) -> Balance {
        match self.delegations.get(from).map(|s| s.mode()) {
            Some(DelegationMode::Percentage) => {
                let bips = self.edges.value_now(&(*from, *to)) as Bips;
                bips_share(balances.value_now(from), bips)
            }
            Some(DelegationMode::Amount) => self.edges.value_now(&(*from, *to)),
            _ => 0,
        }
    }

    pub fn vote_power_from_to_at(
        &self,
        from: &Address,
        to: &Address,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Balance> {
        if self.revoked.contains(&(*from, *to, block)) {
            self.edges.check_boundary(block)?;
            return Ok(0);
        }
        self.edge_value_at(from, to, block, balances)
    }

    /// historical read of many accounts at one strictly past block
    pub fn batch_vote_power_of_at(
        &self,
        accounts: &[Address],
        block: BlockNumber,
        current_block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Vec<Balance>> {
        if block >= current_block {
            return Err(VotePowerError::BlockNotPast {
                block,
                current: current_block,
            });
        }
        accounts
            .iter()
            .map(|a| self.vote_power_of_at(a, block, balances))
            .collect()
    }

    /// active percentage edges; errors in amount mode, where edges are not
    /// enumerable
    pub fn delegates_of(&self, account: &Address) -> Result<Vec<(Address, Bips)>> {
        match self.delegations.get(account) {
            None | Some(DelegationState::NotSet) => Ok(Vec::new()),
            Some(DelegationState::Amount(_)) => Err(VotePowerError::NotEnumerable),
            Some(DelegationState::Percentage(pd)) => {
                Ok(pd.edges().iter().map(|e| (e.to, e.bips)).collect())
            }
        }
    }

    pub fn delegates_of_at(
        &self,
        account: &Address,
        block: BlockNumber,
    ) -> Result<Vec<(Address, Bips)>> {
        match self.delegations.get(account) {
            None | Some(DelegationState::NotSet) => Ok(Vec::new()),
            Some(DelegationState::Amount(_)) => Err(VotePowerError::NotEnumerable),
            Some(DelegationState::Percentage(_)) => {
                self.edges.check_boundary(block)?;
                let Some(history) = self.delegate_lists.get(account) else {
                    return Ok(Vec::new());
                };
                let mut delegates = Vec::new();
                for to in history.at(block) {
                    let bips = self.edges.value_at(&(*account, *to), block)? as Bips;
                    if bips > 0 {
                        delegates.push((*to, bips));
                    }
                }
                Ok(delegates)
            }
        }
    }

    /// outstanding nominal amount-mode total of one delegator
    pub fn explicit_outgoing_total(&self, account: &Address) -> Balance {
        match self.delegations.get(account) {
            Some(DelegationState::Amount(ed)) => ed.total(),
            _ => 0,
        }
    }

    // --- cleanup ---

    pub fn cleanup_block(&self) -> BlockNumber {
        self.delegated_out.cleanup_block()
    }

    /// advance this instance's cleanup boundary; rejects backward moves and
    /// non-past blocks
    pub fn set_cleanup_block(&mut self, block: BlockNumber, current: BlockNumber) -> Result<()> {
        self.delegated_out.set_cleanup_block(block, current)?;
        self.delegated_in.set_cleanup_block(block, current)?;
        self.edges.set_cleanup_block(block, current)?;
        Ok(())
    }

    /// discard checkpoints and revocation records below the boundary,
    /// returning the number of discarded checkpoints
    pub fn trim_history(&mut self) -> usize {
        let boundary = self.cleanup_block();
        let mut discarded = self.delegated_out.trim_all()
            + self.delegated_in.trim_all()
            + self.edges.trim_all();
        for history in self.delegate_lists.values_mut() {
            discarded += history.trim(boundary);
        }
        self.revocation_adjustments
            .retain(|(_, block), _| *block >= boundary);
        self.revoked.retain(|(_, _, block)| *block >= boundary);
        discarded
    }

    // --- internals ---

    fn validate_target(from: &Address, to: &Address) -> Result<()> {
        if to.is_zero() {
            return Err(VotePowerError::ZeroAddress);
        }
        if from == to {
            return Err(VotePowerError::SelfDelegation);
        }
        Ok(())
    }

    fn apply_edge_delta(
        &mut self,
        from: Address,
        to: Address,
        old_amount: Balance,
        new_amount: Balance,
        block: BlockNumber,
    ) {
        let incoming = self.delegated_in.value_now(&to);
        self.delegated_in
            .write(to, block, incoming - old_amount + new_amount);
        let outgoing = self.delegated_out.value_now(&from);
        self.delegated_out
            .write(from, block, outgoing - old_amount + new_amount);
    }

    /// pre-revocation value of one edge at a historical block, derived from
    /// the delegator's current (sticky) mode
    fn edge_value_at(
        &self,
        from: &Address,
        to: &Address,
        block: BlockNumber,
        balances: &CheckpointStore<Address>,
    ) -> Result<Balance> {
        match self.delegations.get(from).map(|s| s.mode()) {
            Some(DelegationMode::Percentage) => {
                let bips = self.edges.value_at(&(*from, *to), block)? as Bips;
                Ok(bips_share(balances.value_at(from, block)?, bips))
            }
            Some(DelegationMode::Amount) => self.edges.value_at(&(*from, *to), block),
            _ => {
                self.edges.check_boundary(block)?;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_low_byte(b)
    }

    fn balances_with(entries: &[(Address, BlockNumber, Balance)]) -> CheckpointStore<Address> {
        let mut balances = CheckpointStore::new();
        for (account, block, value) in entries {
            balances.write(*account, *block, *value);
        }
        balances
    }

    fn ledger() -> VotePowerLedger {
        VotePowerLedger::new(LedgerConfig::default(), false)
    }

    #[test]
    fn test_percentage_delegation_moves_vote_power() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();

        ledger.delegate(a, b, 3000, 1, &balances).unwrap();

        assert_eq!(ledger.vote_power_of(&a, &balances), 140);
        assert_eq!(ledger.vote_power_of(&b, &balances), 60);
        assert_eq!(ledger.undelegated_vote_power_of(&a, &balances), 140);
        assert_eq!(ledger.vote_power_from_to(&a, &b, &balances), 60);
    }

    #[test]
    fn test_balance_change_redistributes_percentage() {
        let a = addr(1);
        let b = addr(2);
        let mut balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 5000, 1, &balances).unwrap();

        balances.write(a, 2, 100);
        ledger.on_balance_changed(a, 200, 100, 2);

        assert_eq!(ledger.vote_power_of(&a, &balances), 50);
        assert_eq!(ledger.vote_power_of(&b, &balances), 50);

        // history at block 1 is unchanged
        assert_eq!(ledger.vote_power_of_at(&a, 1, &balances).unwrap(), 100);
        assert_eq!(ledger.vote_power_of_at(&b, 1, &balances).unwrap(), 100);
    }

    #[test]
    fn test_balance_change_ignores_amount_mode() {
        let a = addr(1);
        let b = addr(2);
        let mut balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate_explicit(a, b, 80, 1, &balances).unwrap();

        balances.write(a, 2, 100);
        ledger.on_balance_changed(a, 200, 100, 2);

        assert_eq!(ledger.vote_power_of(&b, &balances), 80);
        assert_eq!(ledger.vote_power_of(&a, &balances), 20);
    }

    #[test]
    fn test_explicit_delegation_bounded_by_balance() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();
        ledger.delegate_explicit(a, b, 80, 1, &balances).unwrap();

        let err = ledger.delegate_explicit(a, c, 30, 1, &balances).unwrap_err();
        assert_eq!(
            err,
            VotePowerError::ExplicitTotalExceedsBalance {
                total: 110,
                balance: 100
            }
        );
        assert_eq!(ledger.vote_power_of(&c, &balances), 0);
        assert_eq!(ledger.vote_power_of(&a, &balances), 20);

        // a rejected first delegation also leaves the mode unset
        let mut fresh = VotePowerLedger::new(LedgerConfig::default(), false);
        let err = fresh.delegate_explicit(a, b, 101, 1, &balances).unwrap_err();
        assert!(matches!(
            err,
            VotePowerError::ExplicitTotalExceedsBalance { .. }
        ));
        assert_eq!(fresh.mode_of(&a), DelegationMode::NotSet);
    }

    #[test]
    fn test_mode_conflict_aborts_without_state_change() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 1000, 1, &balances).unwrap();

        let err = ledger.delegate_explicit(a, b, 10, 2, &balances).unwrap_err();
        assert_eq!(
            err,
            VotePowerError::ModeConflict {
                active: DelegationMode::Percentage
            }
        );
        assert_eq!(ledger.vote_power_from_to(&a, &b, &balances), 10);
    }

    #[test]
    fn test_failed_first_delegate_leaves_mode_unset() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();

        let err = ledger.delegate(a, b, 10_001, 1, &balances).unwrap_err();
        assert_eq!(err, VotePowerError::BipsOutOfRange(10_001));
        assert_eq!(ledger.mode_of(&a), DelegationMode::NotSet);
    }

    #[test]
    fn test_delegate_rejects_self_and_zero() {
        let a = addr(1);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();

        assert_eq!(
            ledger.delegate(a, a, 100, 1, &balances).unwrap_err(),
            VotePowerError::SelfDelegation
        );
        assert_eq!(
            ledger.delegate(a, Address::ZERO, 100, 1, &balances).unwrap_err(),
            VotePowerError::ZeroAddress
        );
    }

    #[test]
    fn test_undelegate_all_keeps_mode() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 3000, 1, &balances).unwrap();
        ledger.delegate(a, c, 2000, 1, &balances).unwrap();

        ledger.undelegate_all(a, 2, &balances).unwrap();

        assert_eq!(ledger.vote_power_of(&a, &balances), 200);
        assert_eq!(ledger.vote_power_of(&b, &balances), 0);
        assert_eq!(ledger.mode_of(&a), DelegationMode::Percentage);
        assert!(ledger.delegates_of(&a).unwrap().is_empty());

        // and undelegate_all in amount mode is a conflict
        let mut other = VotePowerLedger::new(LedgerConfig::default(), false);
        other.delegate_explicit(a, b, 10, 1, &balances).unwrap();
        assert!(matches!(
            other.undelegate_all(a, 2, &balances),
            Err(VotePowerError::ModeConflict { .. })
        ));
    }

    #[test]
    fn test_undelegate_all_explicit_uses_caller_targets() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();
        ledger.delegate_explicit(a, b, 30, 1, &balances).unwrap();
        ledger.delegate_explicit(a, c, 20, 1, &balances).unwrap();

        // only listed targets are cleared
        ledger.undelegate_all_explicit(a, &[b], 2).unwrap();
        assert_eq!(ledger.vote_power_of(&b, &balances), 0);
        assert_eq!(ledger.vote_power_of(&c, &balances), 20);
        assert_eq!(ledger.vote_power_of(&a, &balances), 80);

        ledger.undelegate_all_explicit(a, &[c], 2).unwrap();
        assert_eq!(ledger.vote_power_of(&a, &balances), 100);
        assert_eq!(ledger.mode_of(&a), DelegationMode::Amount);
    }

    #[test]
    fn test_delegates_of_enumeration_rules() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();

        assert!(ledger.delegates_of(&a).unwrap().is_empty());

        ledger.delegate(a, b, 2500, 1, &balances).unwrap();
        assert_eq!(ledger.delegates_of(&a).unwrap(), vec![(b, 2500)]);

        let mut amount_ledger = VotePowerLedger::new(LedgerConfig::default(), false);
        amount_ledger.delegate_explicit(a, b, 10, 1, &balances).unwrap();
        assert_eq!(
            amount_ledger.delegates_of(&a).unwrap_err(),
            VotePowerError::NotEnumerable
        );
    }

    #[test]
    fn test_delegates_of_at_sees_removed_edges() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 2500, 1, &balances).unwrap();
        ledger.delegate(a, b, 0, 3, &balances).unwrap();

        assert_eq!(ledger.delegates_of_at(&a, 2).unwrap(), vec![(b, 2500)]);
        assert!(ledger.delegates_of_at(&a, 3).unwrap().is_empty());
        assert!(ledger.delegates_of(&a).unwrap().is_empty());
    }

    #[test]
    fn test_delegates_of_at_after_target_rotation() {
        let a = addr(1);
        let balances = balances_with(&[(a, 0, 100)]);
        let mut ledger = ledger();

        // cycle through many targets, never more than one edge at a time
        for i in 0..20u64 {
            let to = addr(100 + i as u8);
            ledger.delegate(a, to, 100, 2 * i + 1, &balances).unwrap();
            ledger.delegate(a, to, 0, 2 * i + 2, &balances).unwrap();
        }
        ledger.delegate(a, addr(2), 500, 50, &balances).unwrap();

        // reads resolve against the list active at the queried block
        assert_eq!(ledger.delegates_of_at(&a, 9).unwrap(), vec![(addr(104), 100)]);
        assert!(ledger.delegates_of_at(&a, 10).unwrap().is_empty());
        assert_eq!(ledger.delegates_of_at(&a, 50).unwrap(), vec![(addr(2), 500)]);
        assert_eq!(ledger.delegates_of(&a).unwrap(), vec![(addr(2), 500)]);

        // old lists fall away with cleanup
        ledger.set_cleanup_block(50, 60).unwrap();
        ledger.trim_history();
        assert!(matches!(
            ledger.delegates_of_at(&a, 10),
            Err(VotePowerError::CleanedUpBlock { .. })
        ));
        assert_eq!(ledger.delegates_of_at(&a, 50).unwrap(), vec![(addr(2), 500)]);
    }

    #[test]
    fn test_revocation_rewrites_one_block() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 3000, 1, &balances).unwrap();

        let amount = ledger.revoke_delegation_at(a, b, 1, 5, &balances).unwrap();
        assert_eq!(amount, 60);

        assert_eq!(ledger.vote_power_of_at(&a, 1, &balances).unwrap(), 200);
        assert_eq!(ledger.vote_power_of_at(&b, 1, &balances).unwrap(), 0);
        assert_eq!(ledger.vote_power_from_to_at(&a, &b, 1, &balances).unwrap(), 0);

        // other blocks are untouched
        assert_eq!(ledger.vote_power_of_at(&a, 2, &balances).unwrap(), 140);
        assert_eq!(ledger.vote_power_from_to_at(&a, &b, 2, &balances).unwrap(), 60);
    }

    #[test]
    fn test_revocation_idempotence_rules() {
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);
        let balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 3000, 1, &balances).unwrap();

        ledger.revoke_delegation_at(a, b, 1, 5, &balances).unwrap();
        assert_eq!(
            ledger.revoke_delegation_at(a, b, 1, 5, &balances).unwrap_err(),
            VotePowerError::AlreadyRevoked
        );

        // revoking a nonexistent edge is a no-op, twice
        assert_eq!(ledger.revoke_delegation_at(a, c, 1, 5, &balances).unwrap(), 0);
        assert_eq!(ledger.revoke_delegation_at(a, c, 1, 5, &balances).unwrap(), 0);

        // and only past blocks are revocable
        assert_eq!(
            ledger.revoke_delegation_at(a, b, 5, 5, &balances).unwrap_err(),
            VotePowerError::RevokeOnlyPast
        );
    }

    #[test]
    fn test_batch_requires_past_block() {
        let a = addr(1);
        let balances = balances_with(&[(a, 0, 100)]);
        let ledger = ledger();

        assert!(matches!(
            ledger.batch_vote_power_of_at(&[a], 5, 5, &balances),
            Err(VotePowerError::BlockNotPast { .. })
        ));
        assert_eq!(
            ledger.batch_vote_power_of_at(&[a], 4, 5, &balances).unwrap(),
            vec![100]
        );
    }

    #[test]
    fn test_cleanup_boundary_and_trim() {
        let a = addr(1);
        let b = addr(2);
        let balances = balances_with(&[(a, 0, 200)]);
        let mut ledger = ledger();
        ledger.delegate(a, b, 3000, 1, &balances).unwrap();
        ledger.delegate(a, b, 4000, 3, &balances).unwrap();

        ledger.set_cleanup_block(3, 5).unwrap();
        let discarded = ledger.trim_history();
        assert!(discarded > 0);

        assert!(matches!(
            ledger.vote_power_of_at(&a, 2, &balances),
            Err(VotePowerError::CleanedUpBlock { .. })
        ));
        assert_eq!(ledger.vote_power_of_at(&a, 3, &balances).unwrap(), 120);

        // boundary is per instance and non-decreasing
        assert!(matches!(
            ledger.set_cleanup_block(2, 5),
            Err(VotePowerError::CleanupBlockBackward { .. })
        ));
    }

    #[test]
    fn test_replacement_lifecycle() {
        let mut plain = VotePowerLedger::new(LedgerConfig::default(), false);
        assert_eq!(
            plain.lifecycle(),
            LedgerLifecycle::Fresh { replacement: false }
        );
        plain.configure_for_replacement();
        assert!(!plain.is_ready_for_replacement());

        let mut replacement = VotePowerLedger::new(LedgerConfig::default(), true);
        replacement.configure_for_replacement();
        assert!(replacement.is_ready_for_replacement());

        // first write consumes readiness
        replacement.on_balance_changed(addr(1), 0, 10, 1);
        assert_eq!(replacement.lifecycle(), LedgerLifecycle::Active);
        assert!(!replacement.is_ready_for_replacement());
    }
}
