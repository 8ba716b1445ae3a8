use ethers::types::{Address, TxHash};
use thiserror::Error;

/// EIP-1193 code for a request the user dismissed in the wallet.
pub const USER_REJECTED_REQUEST: i64 = 4001;

/// Missing or malformed deployment configuration. Fatal, surfaced at first use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing contract address (set PHANTOM_CONTRACT or [contract].address)")]
    MissingContractAddress,

    #[error("Missing public RPC URL (set PUBLIC_RPC_URL or [contract].public_rpc_url)")]
    MissingRpcUrl,

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Invalid RPC URL {0}: {1}")]
    InvalidRpcUrl(String, String),

    #[error("Invalid contract ABI: {0}")]
    Abi(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("No wallet provider detected. Connect your wallet first.")]
    NoProvider,

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("{method} failed ({code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("{method} transport error: {message}")]
    Transport { method: String, message: String },

    #[error("Unexpected response to {method}: {message}")]
    InvalidResponse { method: String, message: String },
}

impl WalletError {
    /// Provider error code, when the wallet answered with a JSON-RPC error.
    pub fn code(&self) -> Option<i64> {
        match self {
            WalletError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The provider's own message, without our framing.
    pub fn provider_message(&self) -> String {
        match self {
            WalletError::Rpc { message, .. }
            | WalletError::Transport { message, .. }
            | WalletError::InvalidResponse { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkSwitchError {
    #[error("Failed to read wallet chain id: {0}")]
    ChainQuery(String),

    #[error("Failed to switch to {chain}: {message}")]
    Switch { chain: String, message: String },

    #[error("Failed to add {chain} network: {message}")]
    Add { chain: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionInitError {
    #[error("Encryption SDK not loaded")]
    SdkNotLoaded,

    #[error("No wallet provider detected. Connect your wallet first.")]
    NoProvider,

    #[error(transparent)]
    Network(#[from] NetworkSwitchError),

    #[error("Failed to initialize encryption: {0}")]
    Init(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    #[error(transparent)]
    Init(#[from] EncryptionInitError),

    #[error("Failed to encrypt data: {0}")]
    Sdk(String),

    #[error("Encryption failed: no ciphertext handle returned")]
    MissingHandle,

    #[error("Encryption failed: invalid handle generated ({0} bytes)")]
    InvalidHandle(usize),

    #[error("Encryption failed: empty input proof")]
    MissingProof,
}

/// A contract return value that does not match the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{record} expects {expected} fields, got {actual}")]
    Arity {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record}.{field}: expected {expected}")]
    FieldType {
        record: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("{record}.{field}: value does not fit in 64 bits")]
    Overflow {
        record: &'static str,
        field: &'static str,
    },
}

/// Read-path failure. Suppressed to `None` at the gateway boundary for single
/// market and position reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{method} call failed: {message}")]
    Rpc {
        method: &'static str,
        message: String,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Write-path failure. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Network(#[from] NetworkSwitchError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error("Encrypted share is bound to {bound:?}, expected {expected:?}")]
    ShareBinding { bound: Address, expected: Address },

    #[error("Encrypted share is bound to account {bound:?}, but the wallet signs as {signer:?}")]
    SignerMismatch { bound: Address, signer: Address },

    #[error("Failed to encode placePosition call: {0}")]
    Encode(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction {0:?} reverted")]
    Reverted(TxHash),

    #[error("Transaction {0:?} not included after {1}s")]
    Dropped(TxHash, u64),
}

impl SubmissionError {
    /// Wallet errors on the signing path, with dismissals reported as rejections.
    pub fn from_signing(err: WalletError) -> Self {
        match err.code() {
            Some(USER_REJECTED_REQUEST) => SubmissionError::Rejected(err.provider_message()),
            _ => SubmissionError::Wallet(err),
        }
    }
}
