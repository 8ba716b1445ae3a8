use ethers::types::Address;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::errors::WalletError;
use crate::wallet::provider::{parse_accounts, WalletProvider};

/// Connected-account state shared by every component that signs or encrypts.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    account: Arc<watch::Sender<Option<Address>>>,
    listener: Option<JoinHandle<()>>,
}

impl WalletSession {
    /// Open a session, picking up an already-authorized account without
    /// prompting and subscribing to account changes.
    pub async fn open(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let (account, _) = watch::channel(None);
        let account = Arc::new(account);

        let listener = provider
            .as_ref()
            .and_then(|p| p.accounts_changed())
            .map(|events| tokio::spawn(follow_accounts(events, Arc::clone(&account))));

        let session = Self {
            provider,
            account,
            listener,
        };

        match session.connected_account().await {
            Ok(existing) => {
                session.account.send_replace(existing);
            }
            Err(e) => warn!("Could not read authorized accounts: {}", e),
        }

        session
    }

    pub fn provider(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
        self.provider.clone().ok_or(WalletError::NoProvider)
    }

    /// Ask the wallet which account signs right now and resync the cached
    /// account if it moved without a change notification.
    pub async fn signer_account(&self) -> Result<Address, WalletError> {
        let signer = self.connected_account().await?.ok_or(WalletError::NoAccounts)?;
        if self.account() != Some(signer) {
            info!("Wallet signer changed to {:?}", signer);
            self.account.send_replace(Some(signer));
        }
        Ok(signer)
    }

    /// Prompt the wallet for account access and return the primary account.
    pub async fn connect(&self) -> Result<Address, WalletError> {
        let provider = self.provider()?;
        let value = provider.request("eth_requestAccounts", json!([])).await?;
        let account = parse_accounts("eth_requestAccounts", value)?
            .first()
            .copied()
            .ok_or(WalletError::NoAccounts)?;

        info!("Wallet connected: {:?}", account);
        self.account.send_replace(Some(account));
        Ok(account)
    }

    /// Already-authorized account, without prompting.
    pub async fn connected_account(&self) -> Result<Option<Address>, WalletError> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(None);
        };
        let value = provider.request("eth_accounts", json!([])).await?;
        Ok(parse_accounts("eth_accounts", value)?.first().copied())
    }

    /// Forget the account locally. Wallets expose no revoke call.
    pub fn disconnect(&self) {
        if self.account.send_replace(None).is_some() {
            info!("Wallet disconnected");
        }
    }

    pub fn account(&self) -> Option<Address> {
        *self.account.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Address>> {
        self.account.subscribe()
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn follow_accounts(
    mut events: broadcast::Receiver<Vec<Address>>,
    account: Arc<watch::Sender<Option<Address>>>,
) {
    loop {
        match events.recv().await {
            Ok(accounts) => {
                account.send_replace(accounts.first().copied());
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {} account change notifications", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
