use ethers::types::TxHash;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use crate::errors::{NetworkSwitchError, WalletError};
use crate::wallet::WalletProvider;

/// EIP-3085 code for a chain the wallet has never heard of.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// The single network every read, encryption and write must happen on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainSpec {
    pub chain_id: u64,
    pub chain_name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    #[serde(default = "default_decimals")]
    pub currency_decimals: u8,
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub explorer_urls: Vec<String>,
}

fn default_decimals() -> u8 { 18 }

impl ChainSpec {
    pub fn sepolia() -> Self {
        Self {
            chain_id: 11_155_111,
            chain_name: "Sepolia Testnet".to_string(),
            currency_name: "SepoliaETH".to_string(),
            currency_symbol: "ETH".to_string(),
            currency_decimals: 18,
            rpc_urls: vec!["https://ethereum-sepolia-rpc.publicnode.com".to_string()],
            explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
        }
    }

    /// Chain id as the hex quantity wallets expect, e.g. `0xaa36a7`.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// `wallet_addEthereumChain` parameter object.
    pub fn add_chain_params(&self) -> Value {
        json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.currency_name,
                "symbol": self.currency_symbol,
                "decimals": self.currency_decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.explorer_urls,
        })
    }

    /// Block explorer link for a transaction, if an explorer is configured.
    pub fn explorer_tx_url(&self, hash: TxHash) -> Option<String> {
        self.explorer_urls
            .first()
            .map(|base| format!("{}/tx/{:?}", base.trim_end_matches('/'), hash))
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::sepolia()
    }
}

/// Makes sure the wallet is on the configured chain, switching (and adding)
/// it when needed.
#[derive(Debug, Clone)]
pub struct NetworkGuard {
    chain: ChainSpec,
}

impl NetworkGuard {
    pub fn new(chain: ChainSpec) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &ChainSpec {
        &self.chain
    }

    pub async fn ensure_network(&self, provider: &dyn WalletProvider) -> Result<(), NetworkSwitchError> {
        let current = current_chain(provider).await?;
        if current == self.chain.chain_id {
            debug!(chain_id = current, "Wallet already on target chain");
            return Ok(());
        }

        info!(
            "Wallet on chain {:#x}, switching to {} ({})",
            current,
            self.chain.chain_name,
            self.chain.chain_id_hex()
        );

        match self.switch(provider).await {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some(UNRECOGNIZED_CHAIN) => {
                warn!("{} unknown to wallet, requesting add", self.chain.chain_name);
                provider
                    .request("wallet_addEthereumChain", json!([self.chain.add_chain_params()]))
                    .await
                    .map_err(|e| NetworkSwitchError::Add {
                        chain: self.chain.chain_name.clone(),
                        message: e.provider_message(),
                    })?;

                self.switch(provider).await.map_err(|e| self.switch_error(e))
            }
            Err(e) => Err(self.switch_error(e)),
        }
    }

    async fn switch(&self, provider: &dyn WalletProvider) -> Result<(), WalletError> {
        provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": self.chain.chain_id_hex() }]),
            )
            .await
            .map(|_| ())
    }

    fn switch_error(&self, err: WalletError) -> NetworkSwitchError {
        NetworkSwitchError::Switch {
            chain: self.chain.chain_name.clone(),
            message: err.provider_message(),
        }
    }
}

async fn current_chain(provider: &dyn WalletProvider) -> Result<u64, NetworkSwitchError> {
    let value = provider
        .request("eth_chainId", json!([]))
        .await
        .map_err(|e| NetworkSwitchError::ChainQuery(e.provider_message()))?;

    parse_chain_id(&value)
        .ok_or_else(|| NetworkSwitchError::ChainQuery(format!("unexpected chain id {}", value)))
}

/// Wallets answer with a hex quantity; a few send a plain number.
pub fn parse_chain_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
