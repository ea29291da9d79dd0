//! error types for the vote power ledger

use crate::delegation::DelegationMode;
use crate::types::{Bips, BlockNumber, LedgerId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VotePowerError {
    // validation
    #[error("cannot delegate to self")]
    SelfDelegation,

    #[error("cannot use the zero address")]
    ZeroAddress,

    #[error("bips share out of range: {0}")]
    BipsOutOfRange(Bips),

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    // mode conflict
    #[error("already delegating by {active}")]
    ModeConflict { active: DelegationMode },

    #[error("delegates are not enumerable in amount mode")]
    NotEnumerable,

    // capacity
    #[error("too many delegates, max {max}")]
    TooManyDelegates { max: usize },

    #[error("total bips exceed 10000: {total}")]
    BipsTotalExceeded { total: u32 },

    #[error("explicitly delegated total exceeds balance: total {total}, balance {balance}")]
    ExplicitTotalExceedsBalance { total: u128, balance: u128 },

    // temporal
    #[error("only past blocks: block {block}, current {current}")]
    BlockNotPast {
        block: BlockNumber,
        current: BlockNumber,
    },

    #[error("revoke is only for the past")]
    RevokeOnlyPast,

    #[error("already revoked")]
    AlreadyRevoked,

    #[error("block {block} is below the cleanup boundary {boundary}")]
    CleanedUpBlock {
        block: BlockNumber,
        boundary: BlockNumber,
    },

    #[error("cleanup block must not move backward: {block} < {boundary}")]
    CleanupBlockBackward {
        block: BlockNumber,
        boundary: BlockNumber,
    },

    #[error("cleanup block must be strictly in the past: block {block}, current {current}")]
    CleanupBlockNotPast {
        block: BlockNumber,
        current: BlockNumber,
    },

    // authorization
    #[error("caller is not the owner")]
    NotOwner,

    #[error("caller may not trigger cleanup")]
    NotCleanupAuthority,

    // configuration
    #[error("ledger is not configured for replacement")]
    NotConfiguredForReplacement,

    #[error("unknown ledger: {0}")]
    UnknownLedger(LedgerId),

    #[error("no write ledger configured")]
    NoWriteLedger,

    #[error("no read ledger configured")]
    NoReadLedger,
}

pub type Result<T> = std::result::Result<T, VotePowerError>;
