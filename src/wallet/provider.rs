use async_trait::async_trait;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use ethers::types::Address;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::errors::{ConfigError, WalletError};

/// EIP-1193 style wallet: JSON-RPC requests plus account change notifications.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;

    /// `accountsChanged` stream, if the wallet can push one.
    fn accounts_changed(&self) -> Option<broadcast::Receiver<Vec<Address>>> {
        None
    }
}

/// Wallet daemon reachable over HTTP JSON-RPC (Frame, a local signer node, ...).
///
/// HTTP has no push channel, so `accountsChanged` is synthesized by polling
/// `eth_accounts` once [`HttpWallet::watch_accounts`] has been started.
pub struct HttpWallet {
    provider: Provider<Http>,
    events: broadcast::Sender<Vec<Address>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl HttpWallet {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| ConfigError::InvalidRpcUrl(url.to_string(), e.to_string()))?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            provider,
            events,
            poller: Mutex::new(None),
        })
    }

    /// Start polling `eth_accounts` and broadcasting changes.
    pub fn watch_accounts(&self, every: Duration) {
        let provider = self.provider.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let mut last: Option<Vec<Address>> = None;

            loop {
                ticker.tick().await;
                let accounts = match provider.request::<_, Value>("eth_accounts", ()).await {
                    Ok(value) => match parse_accounts("eth_accounts", value) {
                        Ok(accounts) => accounts,
                        Err(e) => {
                            warn!("Ignoring malformed eth_accounts response: {}", e);
                            continue;
                        }
                    },
                    Err(e) => {
                        debug!("eth_accounts poll failed: {}", e);
                        continue;
                    }
                };

                if last.as_ref() != Some(&accounts) {
                    if last.is_some() {
                        info!("Wallet accounts changed: {:?}", accounts.first());
                        // No receivers is fine
                        let _ = events.send(accounts.clone());
                    }
                    last = Some(accounts);
                }
            }
        });

        if let Ok(mut poller) = self.poller.lock() {
            if let Some(previous) = poller.replace(handle) {
                previous.abort();
            }
        }
    }
}

#[async_trait]
impl WalletProvider for HttpWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        debug!(method, "wallet request");
        self.provider
            .request::<_, Value>(method, params)
            .await
            .map_err(|e| wallet_error(method, e))
    }

    fn accounts_changed(&self) -> Option<broadcast::Receiver<Vec<Address>>> {
        Some(self.events.subscribe())
    }
}

impl Drop for HttpWallet {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }
    }
}

fn wallet_error(method: &str, err: ProviderError) -> WalletError {
    match err.as_error_response() {
        Some(response) => WalletError::Rpc {
            method: method.to_string(),
            code: response.code,
            message: response.message.clone(),
        },
        None => WalletError::Transport {
            method: method.to_string(),
            message: err.to_string(),
        },
    }
}

/// Parse an `eth_accounts` / `eth_requestAccounts` result.
pub fn parse_accounts(method: &str, value: Value) -> Result<Vec<Address>, WalletError> {
    serde_json::from_value(value).map_err(|e| WalletError::InvalidResponse {
        method: method.to_string(),
        message: e.to_string(),
    })
}
