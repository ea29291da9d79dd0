//! delegation mode state machine
//!
//! each delegator carries a sticky mode: once it delegates by percentage or
//! by explicit amount it can never return to the unset state, so the two
//! edge representations can never mix

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, VotePowerError};
use crate::types::{Address, Balance, Bips, MAX_BIPS};

/// observable delegation mode of an account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationMode {
    NotSet,
    Percentage,
    Amount,
}

impl fmt::Display for DelegationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegationMode::NotSet => write!(f, "not set"),
            DelegationMode::Percentage => write!(f, "percentage"),
            DelegationMode::Amount => write!(f, "amount"),
        }
    }
}

/// one active percentage-mode edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageEdge {
    pub to: Address,
    pub bips: Bips,
}

/// percentage-mode delegation state of one delegator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PercentageDelegation {
    edges: Vec<PercentageEdge>,
}

impl PercentageDelegation {
    /// add, update, or remove (bips == 0) the edge to `to`;
    /// returns the previous bips value
    pub fn set_edge(&mut self, to: Address, bips: Bips, max_delegates: usize) -> Result<Bips> {
        if let Some(pos) = self.edges.iter().position(|e| e.to == to) {
            let old = self.edges[pos].bips;
            if bips == 0 {
                self.edges.remove(pos);
            } else {
                self.check_total(to, bips)?;
                self.edges[pos].bips = bips;
            }
            return Ok(old);
        }
        if bips == 0 {
            return Ok(0);
        }
        if self.edges.len() >= max_delegates {
            return Err(VotePowerError::TooManyDelegates {
                max: max_delegates,
            });
        }
        self.check_total(to, bips)?;
        self.edges.push(PercentageEdge { to, bips });
        Ok(0)
    }

    fn check_total(&self, to: Address, bips: Bips) -> Result<()> {
        let total: u32 = self
            .edges
            .iter()
            .filter(|e| e.to != to)
            .map(|e| e.bips as u32)
            .sum::<u32>()
            + bips as u32;
        if total > MAX_BIPS as u32 {
            return Err(VotePowerError::BipsTotalExceeded { total });
        }
        Ok(())
    }

    pub fn bips_of(&self, to: &Address) -> Bips {
        self.edges
            .iter()
            .find(|e| e.to == *to)
            .map_or(0, |e| e.bips)
    }

    pub fn edges(&self) -> &[PercentageEdge] {
        &self.edges
    }

    /// drop every active edge, returning them; mode stays percentage
    pub fn clear(&mut self) -> Vec<PercentageEdge> {
        std::mem::take(&mut self.edges)
    }
}

/// amount-mode delegation state of one delegator
///
/// edges are held in a map for point lookups but are never iterated by any
/// operation; callers supply the working set (bounded-cost discipline)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExplicitDelegation {
    edges: BTreeMap<Address, Balance>,
    total: Balance,
}

impl ExplicitDelegation {
    /// set or remove (amount == 0) the edge to `to`;
    /// returns the previous nominal amount
    pub fn set_edge(&mut self, to: Address, amount: Balance) -> Balance {
        let old = if amount == 0 {
            self.edges.remove(&to).unwrap_or(0)
        } else {
            self.edges.insert(to, amount).unwrap_or(0)
        };
        self.total = self.total - old + amount;
        old
    }

    pub fn amount_of(&self, to: &Address) -> Balance {
        self.edges.get(to).copied().unwrap_or(0)
    }

    /// total nominal outgoing amount, stored uncapped
    pub fn total(&self) -> Balance {
        self.total
    }
}

/// sticky per-delegator state; the tag is the mode, so "mode never resets"
/// holds structurally
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum DelegationState {
    #[default]
    NotSet,
    Percentage(PercentageDelegation),
    Amount(ExplicitDelegation),
}

impl DelegationState {
    pub fn mode(&self) -> DelegationMode {
        match self {
            DelegationState::NotSet => DelegationMode::NotSet,
            DelegationState::Percentage(_) => DelegationMode::Percentage,
            DelegationState::Amount(_) => DelegationMode::Amount,
        }
    }

    /// enter or stay in percentage mode; conflicts if amount mode is active
    pub fn as_percentage(&mut self) -> Result<&mut PercentageDelegation> {
        if let DelegationState::NotSet = self {
            *self = DelegationState::Percentage(PercentageDelegation::default());
        }
        match self {
            DelegationState::Percentage(pd) => Ok(pd),
            DelegationState::Amount(_) => Err(VotePowerError::ModeConflict {
                active: DelegationMode::Amount,
            }),
            DelegationState::NotSet => unreachable!(),
        }
    }

    /// enter or stay in amount mode; conflicts if percentage mode is active
    pub fn as_amount(&mut self) -> Result<&mut ExplicitDelegation> {
        if let DelegationState::NotSet = self {
            *self = DelegationState::Amount(ExplicitDelegation::default());
        }
        match self {
            DelegationState::Amount(ed) => Ok(ed),
            DelegationState::Percentage(_) => Err(VotePowerError::ModeConflict {
                active: DelegationMode::Percentage,
            }),
            DelegationState::NotSet => unreachable!(),
        }
    }
}

/// floor(balance * bips / 10_000) without overflow
pub(crate) fn bips_share(balance: Balance, bips: Bips) -> Balance {
    let m = MAX_BIPS as u128;
    let b = bips as u128;
    balance / m * b + balance % m * b / m
}
