use chrono::Utc;
use ethers::types::TxHash;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use crate::data::gateway::ContractGateway;
use crate::data::types::{MarketSnapshot, Side, TxInclusion};
use crate::encryption::EncryptionSession;
use crate::errors::SubmissionError;
use crate::execution::types::{SubmissionState, SubmitOutcome, TicketDraft};
use crate::monitoring::journal::{JournalEntry, SubmissionJournal};
use crate::monitoring::metrics;
use crate::monitoring::refresh::RefreshCoordinator;
use crate::network::NetworkGuard;
use crate::wallet::WalletSession;

/// Places an encrypted position and follows it to confirmation.
///
/// Steps run strictly in order: network check, encryption, signature,
/// inclusion, cache refresh. A failure at any step leaves the caches as they
/// were. Only one submission should be in flight at a time; callers check
/// [`SubmissionWorkflow::is_busy`] before submitting.
pub struct SubmissionWorkflow {
    wallet: Arc<WalletSession>,
    guard: Arc<NetworkGuard>,
    encryption: Arc<EncryptionSession>,
    gateway: Arc<ContractGateway>,
    refresher: Arc<RefreshCoordinator>,
    journal: Option<Arc<SubmissionJournal>>,
    state: watch::Sender<SubmissionState>,
}

impl SubmissionWorkflow {
    pub fn new(
        wallet: Arc<WalletSession>,
        guard: Arc<NetworkGuard>,
        encryption: Arc<EncryptionSession>,
        gateway: Arc<ContractGateway>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            wallet,
            guard,
            encryption,
            gateway,
            refresher,
            journal: None,
            state,
        }
    }

    pub fn with_journal(mut self, journal: Arc<SubmissionJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    /// Return to `Idle` after a terminal state.
    pub fn reset(&self) {
        self.state.send_replace(SubmissionState::Idle);
    }

    fn transition(&self, next: SubmissionState) {
        info!("Submission state: {:?}", next);
        self.state.send_replace(next);
    }

    /// Place `draft` on `market`. Without a connected account this only asks
    /// the wallet to connect. On confirmation the draft amount is cleared.
    pub async fn submit(
        &self,
        market: &MarketSnapshot,
        draft: &mut TicketDraft,
    ) -> Result<SubmitOutcome, SubmissionError> {
        if self.wallet.account().is_none() {
            info!("No connected account, requesting wallet connection");
            let connected = match self.wallet.connect().await {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!("Wallet connection failed: {}", e);
                    None
                }
            };
            return Ok(SubmitOutcome::ConnectRequested(connected));
        }

        let share = draft.share_value();
        match self.place(market, draft.side, share).await {
            Ok(inclusion) => {
                draft.clear_amount();
                metrics::record_submission("confirmed");
                self.journal(
                    market,
                    draft.side,
                    Some(inclusion.tx_hash),
                    Some(inclusion.block_number),
                    None,
                );
                Ok(SubmitOutcome::Confirmed(inclusion))
            }
            Err(e) => {
                error!("Failed to place position on {}: {}", market.id, e);
                let tx_hash = match self.state() {
                    SubmissionState::Pending { tx_hash } => Some(tx_hash),
                    _ => None,
                };
                self.transition(SubmissionState::Failed {
                    message: e.to_string(),
                });
                metrics::record_submission("failed");
                self.journal(market, draft.side, tx_hash, None, Some(&e));
                Err(e)
            }
        }
    }

    async fn place(
        &self,
        market: &MarketSnapshot,
        side: Side,
        share: u64,
    ) -> Result<TxInclusion, SubmissionError> {
        self.transition(SubmissionState::Encrypting);
        let provider = self.wallet.provider()?;
        self.guard.ensure_network(provider.as_ref()).await?;

        // The cached account can lag a wallet switch; bind to the live signer
        let account = self.wallet.signer_account().await?;
        let contract = self.gateway.contract_address()?;
        let encrypted = self
            .encryption
            .encrypt_normalized(share, contract, account)
            .await?;
        if encrypted.account != account {
            return Err(SubmissionError::SignerMismatch {
                bound: encrypted.account,
                signer: account,
            });
        }

        self.transition(SubmissionState::AwaitingSignature);
        let pending = self
            .gateway
            .submit_position(&market.id, side.is_yes(), &encrypted, market.entry_fee)
            .await?;

        let tx_hash = pending.tx_hash;
        self.transition(SubmissionState::Pending { tx_hash });
        match self.guard.chain().explorer_tx_url(tx_hash) {
            Some(url) => info!("Transaction submitted: {}", url),
            None => info!("Transaction submitted: {:?}", tx_hash),
        }

        let inclusion = pending.confirm().await?;
        info!("Position confirmed in block #{}", inclusion.block_number);

        if !self.refresher.refresh(&market.id, Some(account)).await {
            warn!("Post-confirmation refresh of {} failed; polling will catch up", market.id);
        }

        self.transition(SubmissionState::Confirmed {
            tx_hash,
            block_number: inclusion.block_number,
        });
        Ok(inclusion)
    }

    fn journal(
        &self,
        market: &MarketSnapshot,
        side: Side,
        tx_hash: Option<TxHash>,
        block: Option<u64>,
        err: Option<&SubmissionError>,
    ) {
        let Some(journal) = &self.journal else {
            return;
        };
        let entry = JournalEntry {
            timestamp: Utc::now(),
            market_id: market.id.clone(),
            side,
            tx_hash,
            block,
            status: if err.is_some() { "failed" } else { "confirmed" },
            error: err.map(|e| e.to_string()),
        };
        if let Err(e) = journal.record(&entry) {
            warn!("Failed to write submission journal: {}", e);
        }
    }
}
