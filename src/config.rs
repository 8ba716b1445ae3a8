use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use crate::data::gateway::GatewaySettings;
use crate::encryption::sdk::SdkNetworkConfig;
use crate::monitoring::refresh::DEFAULT_POLL_INTERVAL;
use crate::network::ChainSpec;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: ChainSpec,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Both fields stay optional: a missing value is reported by the gateway on
/// first use, not at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractConfig {
    pub address: Option<String>,
    pub public_rpc_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_wallet_rpc")]
    pub rpc_url: String,
    #[serde(default = "default_account_poll")]
    pub account_poll_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_wallet_rpc(),
            account_poll_secs: default_account_poll(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default = "default_relayer_url")]
    pub relayer_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_acl_address")]
    pub acl_address: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            relayer_url: default_relayer_url(),
            gateway_url: default_gateway_url(),
            acl_address: default_acl_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_confirm_poll")]
    pub confirm_poll_ms: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            confirm_poll_ms: default_confirm_poll(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_path")]
    pub csv_log_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_path(),
        }
    }
}

fn default_wallet_rpc() -> String { "http://127.0.0.1:1248".to_string() }
fn default_account_poll() -> u64 { 2 }
fn default_relayer_url() -> String { "https://relayer.testnet.zama.cloud".to_string() }
fn default_gateway_url() -> String { "https://gateway.sepolia.zama.ai".to_string() }
fn default_acl_address() -> String { "0x687820221192C5B662b25367F70076A37bc79b6c".to_string() }
fn default_interval() -> u64 { DEFAULT_POLL_INTERVAL.as_secs() }
fn default_confirm_poll() -> u64 { 2_000 }
fn default_confirm_timeout() -> u64 { 300 }
fn default_csv_path() -> String { "submissions.csv".to_string() }

/// Deployment values that may come from the environment (or a `.env` file).
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub contract_address: Option<String>,
    pub public_rpc_url: Option<String>,
    pub wallet_rpc_url: Option<String>,
    pub relayer_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!("No config file at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Environment values win over the file.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(address) = &env.contract_address {
            self.contract.address = Some(address.clone());
        }
        if let Some(url) = &env.public_rpc_url {
            self.contract.public_rpc_url = Some(url.clone());
        }
        if let Some(url) = &env.wallet_rpc_url {
            self.wallet.rpc_url = url.clone();
        }
        if let Some(url) = &env.relayer_url {
            self.encryption.relayer_url = url.clone();
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            contract_address: self.contract.address.clone(),
            public_rpc_url: self
                .contract
                .public_rpc_url
                .clone()
                .or_else(|| self.network.rpc_urls.first().cloned()),
            confirm_poll: Duration::from_millis(self.refresh.confirm_poll_ms),
            confirm_timeout: Duration::from_secs(self.refresh.confirm_timeout_secs),
        }
    }

    pub fn sdk_network(&self) -> Result<SdkNetworkConfig> {
        let acl_address = self
            .encryption
            .acl_address
            .parse::<Address>()
            .with_context(|| format!("Invalid ACL address: {}", self.encryption.acl_address))?;

        Ok(SdkNetworkConfig {
            chain_id: self.network.chain_id,
            gateway_url: self.encryption.gateway_url.clone(),
            acl_address,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs.max(1))
    }

    pub fn account_poll(&self) -> Duration {
        Duration::from_secs(self.wallet.account_poll_secs.max(1))
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            contract_address: non_empty_var("PHANTOM_CONTRACT"),
            public_rpc_url: non_empty_var("PUBLIC_RPC_URL"),
            wallet_rpc_url: non_empty_var("WALLET_RPC_URL"),
            relayer_url: non_empty_var("RELAYER_URL"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_sepolia_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.network.chain_id, 11_155_111);
        assert_eq!(config.network.chain_id_hex(), "0xaa36a7");
        assert_eq!(config.refresh.interval_secs, 15);
        assert_eq!(config.wallet.rpc_url, "http://127.0.0.1:1248");
        assert!(config.contract.address.is_none());
        assert!(!config.monitoring.csv_logging);
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [network]
            chain_id = 31337
            chain_name = "Local"
            currency_name = "Ether"
            currency_symbol = "ETH"
            rpc_urls = ["http://127.0.0.1:8545"]

            [contract]
            address = "0x00000000000000000000000000000000000c0fee"

            [refresh]
            interval_secs = 5
            confirm_poll_ms = 250

            [monitoring]
            csv_logging = true
            csv_log_path = "logs/submissions.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.chain_id, 31337);
        assert_eq!(config.network.currency_decimals, 18);
        assert!(config.network.explorer_urls.is_empty());
        assert_eq!(config.refresh.confirm_timeout_secs, 300);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));

        let settings = config.gateway_settings();
        assert_eq!(settings.public_rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(settings.confirm_poll, Duration::from_millis(250));
        assert!(settings.contract().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config.contract.public_rpc_url = Some("http://file".to_string());

        config.apply_env(&EnvConfig {
            contract_address: Some("0x00000000000000000000000000000000000c0fee".to_string()),
            public_rpc_url: Some("http://env".to_string()),
            wallet_rpc_url: None,
            relayer_url: Some("http://relayer".to_string()),
        });

        assert_eq!(config.gateway_settings().public_rpc_url.as_deref(), Some("http://env"));
        assert_eq!(config.wallet.rpc_url, "http://127.0.0.1:1248");
        assert_eq!(config.encryption.relayer_url, "http://relayer");
        assert!(config.contract.address.is_some());
    }

    #[test]
    fn test_sdk_network_rejects_bad_acl() {
        let mut config = Config::default();
        assert_eq!(config.sdk_network().unwrap().chain_id, 11_155_111);

        config.encryption.acl_address = "nope".to_string();
        assert!(config.sdk_network().is_err());
    }
}
