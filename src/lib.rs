//! Client for a confidential prediction market: market snapshots read from
//! the contract, stakes encrypted before they leave the process, and
//! submission tracked until the chain confirms it.

pub mod client;
pub mod config;
pub mod data;
pub mod encryption;
pub mod errors;
pub mod execution;
pub mod monitoring;
pub mod network;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use client::PhantomClient;
pub use errors::{
    ConfigError, DecodeError, EncryptionError, EncryptionInitError, NetworkSwitchError, ReadError,
    SubmissionError, WalletError,
};
