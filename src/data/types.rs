use ethers::types::{Address, Bytes, TxHash, H256, U256};

/// Point-in-time view of one market, rebuilt on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub id: String,
    pub question: String,
    pub category: String,
    pub rules: String,
    pub oracle_uri: String,
    pub creator: Address,
    /// Wei.
    pub entry_fee: U256,
    /// Seconds since epoch.
    pub lock_time: u64,
    pub yes_pool: U256,
    pub no_pool: U256,
    pub cancelled: bool,
    pub resolved: bool,
    pub decryptable: bool,
    pub outcome_yes: bool,
    pub push_all: bool,
    pub winner_count: u64,
    /// Only meaningful when `decryptable`.
    pub revealed_yes: u64,
    pub revealed_no: u64,
}

impl MarketSnapshot {
    pub fn total_pool(&self) -> U256 {
        self.yes_pool.saturating_add(self.no_pool)
    }

    /// Cancelled and resolved are mutually exclusive on a healthy contract.
    pub fn is_well_formed(&self) -> bool {
        !(self.cancelled && self.resolved)
    }
}

/// A single account's position in a market. `exists == false` is a real answer
/// from the contract, not a failed read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPosition {
    pub exists: bool,
    pub vote_yes: bool,
    pub claimed: bool,
    pub stake: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn is_yes(self) -> bool {
        matches!(self, Side::Yes)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Ciphertext handle and validity proof for one stake. Bound to the contract
/// and account it was produced for, used once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedShare {
    pub handle: H256,
    pub proof: Bytes,
    pub contract: Address,
    pub account: Address,
}

/// A transaction that made it into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInclusion {
    pub tx_hash: TxHash,
    pub block_number: u64,
}
