//! core types for the vote power ledger

use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_raw(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// short constructor for tests and examples: last byte set, rest zero
    pub fn from_low_byte(b: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = b;
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

/// token amount in smallest unit
pub type Balance = u128;

/// block number (checkpoint ordering key)
pub type BlockNumber = u64;

/// basis points, 1/10_000
pub type Bips = u16;

/// full delegation share in basis points
pub const MAX_BIPS: Bips = 10_000;

/// ledger instance handle within a token's ledger slab
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerId(pub u32);

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ledger#{}", self.0)
    }
}

/// tunable bounds for one ledger instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// maximum simultaneous percentage-mode delegates per delegator;
    /// keeps per-transfer redistribution cost constant
    pub max_delegates_by_percent: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_delegates_by_percent: 2,
        }
    }
}
