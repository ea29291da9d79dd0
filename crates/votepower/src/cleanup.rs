//! cleanup coordinator
//!
//! broadcasts a cleanup boundary to every registered ledger, isolating
//! per-ledger failures: one misbehaving ledger never blocks the others

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::token::VotePowerToken;
use crate::types::{Address, BlockNumber, LedgerId};

/// outcome of trimming one registered ledger
#[derive(Clone, Debug)]
pub struct CleanupOutcome {
    pub ledger: LedgerId,
    /// discarded checkpoint count, or the error that ledger raised
    pub result: Result<usize>,
}

/// per-target report of one cleanup broadcast
#[derive(Clone, Debug)]
pub struct CleanupReport {
    pub boundary: BlockNumber,
    /// the token-owned balance history is a target like any ledger
    pub balances: Result<usize>,
    pub ledgers: Vec<CleanupOutcome>,
}

impl CleanupReport {
    pub fn all_ok(&self) -> bool {
        self.balances.is_ok() && self.ledgers.iter().all(|o| o.result.is_ok())
    }

    pub fn discarded(&self) -> usize {
        self.balances.as_ref().copied().unwrap_or(0)
            + self
                .ledgers
                .iter()
                .filter_map(|o| o.result.as_ref().ok())
                .sum::<usize>()
    }
}

/// owned registry of cleanup targets
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CleanupCoordinator {
    registered: Vec<LedgerId>,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: LedgerId) {
        if !self.registered.contains(&id) {
            self.registered.push(id);
        }
    }

    pub fn unregister(&mut self, id: LedgerId) {
        self.registered.retain(|r| *r != id);
    }

    pub fn registered(&self) -> &[LedgerId] {
        &self.registered
    }

    /// advance the boundary on the token's balance history and every
    /// registered ledger, best-effort: failures are reported per target,
    /// never propagated; callable by the owner or the designated
    /// cleanup coordinator address
    pub fn set_cleanup_block(
        &self,
        token: &mut VotePowerToken,
        caller: Address,
        boundary: BlockNumber,
    ) -> Result<CleanupReport> {
        token.require_cleanup_authority(caller)?;

        let balances = token.trim_balances(boundary);
        if let Err(e) = &balances {
            warn!(boundary, error = %e, "balance history rejected cleanup boundary");
        }

        let mut ledgers = Vec::with_capacity(self.registered.len());
        for &id in &self.registered {
            let result = token.trim_ledger(id, boundary);
            if let Err(e) = &result {
                warn!(%id, boundary, error = %e, "ledger rejected cleanup boundary");
            }
            ledgers.push(CleanupOutcome { ledger: id, result });
        }

        let report = CleanupReport {
            boundary,
            balances,
            ledgers,
        };
        info!(
            boundary,
            targets = report.ledgers.len() + 1,
            discarded = report.discarded(),
            ok = report.all_ok(),
            "cleanup boundary broadcast"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VotePowerError;
    use crate::types::LedgerConfig;

    fn addr(b: u8) -> crate::types::Address {
        crate::types::Address::from_low_byte(b)
    }

    fn owner() -> crate::types::Address {
        addr(0xff)
    }

    fn setup() -> (VotePowerToken, CleanupCoordinator, LedgerId, LedgerId) {
        let mut token = VotePowerToken::new(owner());
        let first = token
            .add_ledger(owner(), LedgerConfig::default(), false)
            .unwrap();
        token.set_write_ledger(owner(), first).unwrap();
        let second = token
            .add_ledger(owner(), LedgerConfig::default(), true)
            .unwrap();

        let mut coordinator = CleanupCoordinator::new();
        coordinator.register(first);
        coordinator.register(second);
        (token, coordinator, first, second)
    }

    #[test]
    fn test_broadcast_trims_every_target() {
        let (mut token, coordinator, _, _) = setup();
        let a = addr(1);
        token.mint(owner(), a, 100).unwrap();
        token.advance_block(1);
        token.transfer(a, addr(2), 10).unwrap();
        token.advance_block(5);

        let report = coordinator.set_cleanup_block(&mut token, owner(), 2).unwrap();
        assert!(report.all_ok());
        assert!(report.discarded() > 0);
        assert_eq!(token.cleanup_block(), 2);

        assert!(matches!(
            token.balance_of_at(&a, 1),
            Err(VotePowerError::CleanedUpBlock { .. })
        ));
        assert_eq!(token.balance_of_at(&a, 2).unwrap(), 90);
    }

    #[test]
    fn test_failure_is_isolated_per_ledger() {
        let (mut token, coordinator, first, second) = setup();
        token.advance_block(10);

        // second ledger's boundary is already ahead of the broadcast value
        token.trim_ledger(second, 8).unwrap();

        let report = coordinator.set_cleanup_block(&mut token, owner(), 5).unwrap();
        assert!(!report.all_ok());
        assert!(report.balances.is_ok());

        let by_id = |id: LedgerId| {
            report
                .ledgers
                .iter()
                .find(|o| o.ledger == id)
                .unwrap()
                .result
                .clone()
        };
        assert!(by_id(first).is_ok());
        assert!(matches!(
            by_id(second),
            Err(VotePowerError::CleanupBlockBackward { .. })
        ));
    }

    #[test]
    fn test_broadcast_requires_cleanup_authority() {
        let (mut token, coordinator, _, _) = setup();
        token.advance_block(5);
        assert_eq!(
            coordinator
                .set_cleanup_block(&mut token, addr(1), 2)
                .unwrap_err(),
            VotePowerError::NotCleanupAuthority
        );

        // a designated coordinator address may broadcast
        token.set_cleanup_coordinator(owner(), addr(1)).unwrap();
        let report = coordinator.set_cleanup_block(&mut token, addr(1), 2).unwrap();
        assert!(report.all_ok());
    }

    #[test]
    fn test_register_unregister() {
        let (mut token, mut coordinator, first, second) = setup();
        coordinator.unregister(second);
        assert_eq!(coordinator.registered(), &[first]);

        coordinator.register(first);
        assert_eq!(coordinator.registered().len(), 1);

        token.advance_block(5);
        let report = coordinator.set_cleanup_block(&mut token, owner(), 2).unwrap();
        assert_eq!(report.ledgers.len(), 1);
    }
}
