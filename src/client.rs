use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use crate::config::Config;
use crate::data::cache::SnapshotCache;
use crate::data::gateway::ContractGateway;
use crate::encryption::sdk::{EncryptionSdk, RelayerSdk};
use crate::encryption::EncryptionSession;
use crate::execution::SubmissionWorkflow;
use crate::monitoring::journal::SubmissionJournal;
use crate::monitoring::refresh::RefreshCoordinator;
use crate::network::NetworkGuard;
use crate::wallet::{HttpWallet, WalletProvider, WalletSession};

/// Every component, wired once and shared by reference.
pub struct PhantomClient {
    wallet: Arc<WalletSession>,
    guard: Arc<NetworkGuard>,
    encryption: Arc<EncryptionSession>,
    gateway: Arc<ContractGateway>,
    refresher: Arc<RefreshCoordinator>,
    workflow: SubmissionWorkflow,
}

impl PhantomClient {
    /// Connect to the wallet daemon and relayer named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let http_wallet = HttpWallet::new(&config.wallet.rpc_url)
            .with_context(|| format!("Failed to create wallet client for {}", config.wallet.rpc_url))?;
        http_wallet.watch_accounts(config.account_poll());
        let provider: Arc<dyn WalletProvider> = Arc::new(http_wallet);

        let sdk: Arc<dyn EncryptionSdk> = Arc::new(RelayerSdk::new(config.encryption.relayer_url.clone()));
        let journal = if config.monitoring.csv_logging {
            let journal = SubmissionJournal::new(config.monitoring.csv_log_path.clone())
                .with_context(|| format!("Failed to open journal {}", config.monitoring.csv_log_path))?;
            Some(Arc::new(journal))
        } else {
            None
        };

        Self::assemble(config, Some(provider), Some(sdk), journal).await
    }

    /// Wire components around an explicit wallet provider and SDK.
    pub async fn assemble(
        config: &Config,
        provider: Option<Arc<dyn WalletProvider>>,
        sdk: Option<Arc<dyn EncryptionSdk>>,
        journal: Option<Arc<SubmissionJournal>>,
    ) -> Result<Self> {
        let wallet = Arc::new(WalletSession::open(provider.clone()).await);
        let guard = Arc::new(NetworkGuard::new(config.network.clone()));
        let encryption = Arc::new(EncryptionSession::new(
            sdk,
            provider.clone(),
            Arc::clone(&guard),
            config.sdk_network()?,
        ));
        let gateway = Arc::new(ContractGateway::new(config.gateway_settings(), provider));
        let refresher = Arc::new(RefreshCoordinator::new(
            Arc::clone(&gateway),
            Arc::new(SnapshotCache::new()),
            config.poll_interval(),
        ));

        let mut workflow = SubmissionWorkflow::new(
            Arc::clone(&wallet),
            Arc::clone(&guard),
            Arc::clone(&encryption),
            Arc::clone(&gateway),
            Arc::clone(&refresher),
        );
        if let Some(journal) = journal {
            workflow = workflow.with_journal(journal);
        }

        info!(
            "Client ready on {} ({}), account: {:?}",
            config.network.chain_name,
            config.network.chain_id_hex(),
            wallet.account()
        );

        Ok(Self {
            wallet,
            guard,
            encryption,
            gateway,
            refresher,
            workflow,
        })
    }

    pub fn wallet(&self) -> &Arc<WalletSession> {
        &self.wallet
    }

    pub fn guard(&self) -> &Arc<NetworkGuard> {
        &self.guard
    }

    pub fn encryption(&self) -> &Arc<EncryptionSession> {
        &self.encryption
    }

    pub fn gateway(&self) -> &Arc<ContractGateway> {
        &self.gateway
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        self.refresher.cache()
    }

    pub fn workflow(&self) -> &SubmissionWorkflow {
        &self.workflow
    }
}
