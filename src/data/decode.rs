//! Contract ABI and the positional layouts of its view-method return values.
//!
//! `getMarket` returns a flat tuple and ethers hands it back as a `Vec<Token>`
//! in declaration order. The decode below is the only place that knows the
//! order: when the contract's struct changes, bump `MARKET_SCHEMA_VERSION`
//! and edit `MARKET_FIELDS`, the ABI line and `decode_market` together.

use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address, U256};
use crate::data::types::{MarketSnapshot, UserPosition};
use crate::errors::{ConfigError, DecodeError};
use tracing::warn;

pub const MARKET_SCHEMA_VERSION: u32 = 1;

/// `getMarket` output order, schema v1.
pub const MARKET_FIELDS: [&str; 17] = [
    "question",
    "category",
    "rules",
    "oracleURI",
    "creator",
    "entryFee",
    "lockTime",
    "yesPool",
    "noPool",
    "cancelled",
    "resolved",
    "decryptable",
    "outcomeYes",
    "pushAll",
    "winnerCount",
    "revealedYes",
    "revealedNo",
];

/// `getPosition` output order.
pub const POSITION_FIELDS: [&str; 4] = ["exists", "voteYes", "claimed", "stake"];

const CONTRACT_ABI: &[&str] = &[
    "function listMarkets() view returns (string[])",
    "function getMarket(string marketId) view returns (string, string, string, string, address, uint256, uint64, uint256, uint256, bool, bool, bool, bool, bool, uint32, uint64, uint64)",
    "function getPosition(string marketId, address account) view returns (bool, bool, bool, uint256)",
    "function placePosition(string marketId, bool voteYes, bytes32 encryptedShare, bytes proof) payable",
];

pub fn contract_abi() -> Result<Abi, ConfigError> {
    parse_abi(CONTRACT_ABI).map_err(|e| ConfigError::Abi(e.to_string()))
}

/// Positional reader over a decoded return tuple.
struct Fields<'a> {
    record: &'static str,
    names: &'static [&'static str],
    tokens: &'a [Token],
}

impl<'a> Fields<'a> {
    fn new(
        record: &'static str,
        names: &'static [&'static str],
        tokens: &'a [Token],
    ) -> Result<Self, DecodeError> {
        // Struct returns arrive wrapped in a single tuple token
        let tokens = match tokens {
            [Token::Tuple(inner)] if names.len() > 1 => inner.as_slice(),
            other => other,
        };

        if tokens.len() != names.len() {
            return Err(DecodeError::Arity {
                record,
                expected: names.len(),
                actual: tokens.len(),
            });
        }
        Ok(Self { record, names, tokens })
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> DecodeError {
        DecodeError::FieldType {
            record: self.record,
            field: self.names[index],
            expected,
        }
    }

    fn string(&self, index: usize) -> Result<String, DecodeError> {
        match &self.tokens[index] {
            Token::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    fn address(&self, index: usize) -> Result<Address, DecodeError> {
        match &self.tokens[index] {
            Token::Address(a) => Ok(*a),
            _ => Err(self.mismatch(index, "address")),
        }
    }

    fn uint(&self, index: usize) -> Result<U256, DecodeError> {
        match &self.tokens[index] {
            Token::Uint(v) | Token::Int(v) => Ok(*v),
            _ => Err(self.mismatch(index, "uint")),
        }
    }

    fn u64(&self, index: usize) -> Result<u64, DecodeError> {
        let value = self.uint(index)?;
        if value > U256::from(u64::MAX) {
            return Err(DecodeError::Overflow {
                record: self.record,
                field: self.names[index],
            });
        }
        Ok(value.as_u64())
    }

    fn bool(&self, index: usize) -> Result<bool, DecodeError> {
        match &self.tokens[index] {
            Token::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(index, "bool")),
        }
    }
}

pub fn decode_market(id: &str, raw: &[Token]) -> Result<MarketSnapshot, DecodeError> {
    let f = Fields::new("Market", &MARKET_FIELDS, raw)?;

    let market = MarketSnapshot {
        id: id.to_string(),
        question: f.string(0)?,
        category: f.string(1)?,
        rules: f.string(2)?,
        oracle_uri: f.string(3)?,
        creator: f.address(4)?,
        entry_fee: f.uint(5)?,
        lock_time: f.u64(6)?,
        yes_pool: f.uint(7)?,
        no_pool: f.uint(8)?,
        cancelled: f.bool(9)?,
        resolved: f.bool(10)?,
        decryptable: f.bool(11)?,
        outcome_yes: f.bool(12)?,
        push_all: f.bool(13)?,
        winner_count: f.u64(14)?,
        revealed_yes: f.u64(15)?,
        revealed_no: f.u64(16)?,
    };

    if !market.is_well_formed() {
        warn!("Market {} is flagged both cancelled and resolved", id);
    }
    Ok(market)
}

pub fn decode_position(raw: &[Token]) -> Result<UserPosition, DecodeError> {
    let f = Fields::new("Position", &POSITION_FIELDS, raw)?;

    Ok(UserPosition {
        exists: f.bool(0)?,
        vote_yes: f.bool(1)?,
        claimed: f.bool(2)?,
        stake: f.uint(3)?,
    })
}

/// `listMarkets` returns `string[]`.
pub fn decode_market_ids(raw: &[Token]) -> Result<Vec<String>, DecodeError> {
    let items = match raw {
        [Token::Array(items)] => items,
        _ => {
            return Err(DecodeError::FieldType {
                record: "listMarkets",
                field: "ids",
                expected: "string[]",
            })
        }
    };

    items
        .iter()
        .map(|item| match item {
            Token::String(s) => Ok(s.clone()),
            _ => Err(DecodeError::FieldType {
                record: "listMarkets",
                field: "ids",
                expected: "string",
            }),
        })
        .collect()
}
