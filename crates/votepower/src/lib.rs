//! votepower - checkpointed vote power ledger with bounded delegation
//!
//! an account's voting weight is its token balance adjusted by the
//! delegations it has made or received, queryable now or at any past block.
//! built for oracle governance, where weight drives whitelisting and
//! median weighting.
//!
//! core pieces:
//! - block-ordered checkpoint histories with binary-search reads and
//!   bounded front-trimming below a cleanup boundary
//! - two mutually exclusive delegation modes per account, percentage
//!   (basis points, few edges, redistributed on every transfer) and
//!   explicit amount (absolute, caller-enumerated)
//! - historical revocation of single edges at single past blocks
//! - a replaceable ledger front: delegation state can be swapped out
//!   without losing balance history
//! - best-effort cleanup broadcast across ledger instances
//!
//! every operation that could iterate an unbounded structure is either
//! capped (percentage edges) or takes the working set from the caller
//! (explicit undelegation, batch reads)

pub mod cache;
pub mod checkpoint;
pub mod cleanup;
pub mod delegation;
pub mod error;
pub mod ledger;
pub mod token;
pub mod types;

pub use cache::VotePowerCache;
pub use checkpoint::{Checkpoint, CheckpointHistory, CheckpointStore};
pub use cleanup::{CleanupCoordinator, CleanupOutcome, CleanupReport};
pub use delegation::{DelegationMode, DelegationState, PercentageEdge};
pub use error::{Result, VotePowerError};
pub use ledger::{LedgerLifecycle, VotePowerLedger};
pub use token::VotePowerToken;
pub use types::{Address, Balance, Bips, BlockNumber, LedgerConfig, LedgerId, MAX_BIPS};
