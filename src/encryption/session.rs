use ethers::types::{Address, H256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use crate::data::types::EncryptedShare;
use crate::encryption::sdk::{EncryptionInstance, EncryptionSdk, SdkNetworkConfig};
use crate::errors::{EncryptionError, EncryptionInitError};
use crate::network::NetworkGuard;
use crate::wallet::WalletProvider;

/// Length of an FHE ciphertext handle (`bytes32` on the contract side).
pub const HANDLE_LEN: usize = 32;

/// Clamp a requested stake to the 64-bit share the contract accepts.
/// Anything non-finite or below one becomes one; the rest is floored.
pub fn normalize_share(value: f64) -> u64 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    // `as` saturates at u64::MAX
    value.floor() as u64
}

/// Lazily built encryption instance, shared by every submission.
///
/// Construction happens under a lock, so concurrent first calls wait for and
/// reuse the first instance that succeeds. `reset` drops it; nothing calls it
/// automatically when the account or chain changes.
pub struct EncryptionSession {
    sdk: Option<Arc<dyn EncryptionSdk>>,
    ambient: Option<Arc<dyn WalletProvider>>,
    guard: Arc<NetworkGuard>,
    config: SdkNetworkConfig,
    instance: Mutex<Option<Arc<dyn EncryptionInstance>>>,
}

impl EncryptionSession {
    pub fn new(
        sdk: Option<Arc<dyn EncryptionSdk>>,
        ambient: Option<Arc<dyn WalletProvider>>,
        guard: Arc<NetworkGuard>,
        config: SdkNetworkConfig,
    ) -> Self {
        Self {
            sdk,
            ambient,
            guard,
            config,
            instance: Mutex::new(None),
        }
    }

    /// Return the instance, building it on first use with `provider` or the
    /// session's own wallet provider.
    pub async fn initialize(
        &self,
        provider: Option<Arc<dyn WalletProvider>>,
    ) -> Result<Arc<dyn EncryptionInstance>, EncryptionInitError> {
        let mut slot = self.instance.lock().await;
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }

        let provider = provider
            .or_else(|| self.ambient.clone())
            .ok_or(EncryptionInitError::NoProvider)?;
        let sdk = self.sdk.as_ref().ok_or(EncryptionInitError::SdkNotLoaded)?;

        let instance = self.build(sdk.as_ref(), provider).await.map_err(|e| {
            error!("Encryption initialization error: {}", e);
            e
        })?;

        info!(chain_id = self.config.chain_id, "Encryption session initialized");
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    async fn build(
        &self,
        sdk: &dyn EncryptionSdk,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Arc<dyn EncryptionInstance>, EncryptionInitError> {
        sdk.init()
            .await
            .map_err(|e| EncryptionInitError::Init(e.to_string()))?;

        // Ciphertexts are bound to the chain the instance was created on
        self.guard.ensure_network(provider.as_ref()).await?;

        sdk.create_instance(&self.config, provider)
            .await
            .map_err(|e| EncryptionInitError::Init(e.to_string()))
    }

    pub async fn is_initialized(&self) -> bool {
        self.instance.lock().await.is_some()
    }

    /// Drop the instance; the next call rebuilds it.
    pub async fn reset(&self) {
        if self.instance.lock().await.take().is_some() {
            info!("Encryption session reset");
        }
    }

    /// Encrypt a stake for `(contract, wallet)` as a 64-bit value.
    pub async fn encrypt_share(
        &self,
        value: f64,
        contract: Address,
        wallet: Address,
    ) -> Result<EncryptedShare, EncryptionError> {
        self.encrypt_normalized(normalize_share(value), contract, wallet).await
    }

    /// Encrypt a share that is already a whole number of at least one.
    pub async fn encrypt_normalized(
        &self,
        share: u64,
        contract: Address,
        wallet: Address,
    ) -> Result<EncryptedShare, EncryptionError> {
        let result = self.encrypt_inner(share.max(1), contract, wallet).await;
        if let Err(e) = &result {
            error!("Encryption error: {}", e);
        }
        result
    }

    async fn encrypt_inner(
        &self,
        share: u64,
        contract: Address,
        wallet: Address,
    ) -> Result<EncryptedShare, EncryptionError> {
        let instance = self.initialize(None).await?;

        let mut input = instance.create_encrypted_input(contract, wallet);
        input.add64(share);
        let payload = input
            .encrypt()
            .await
            .map_err(|e| EncryptionError::Sdk(e.to_string()))?;

        let handle = payload.handles.first().ok_or(EncryptionError::MissingHandle)?;
        if handle.is_empty() {
            return Err(EncryptionError::MissingHandle);
        }
        if handle.len() != HANDLE_LEN {
            return Err(EncryptionError::InvalidHandle(handle.len()));
        }
        if payload.input_proof.is_empty() {
            return Err(EncryptionError::MissingProof);
        }

        Ok(EncryptedShare {
            handle: H256::from_slice(handle),
            proof: payload.input_proof,
            contract,
            account: wallet,
        })
    }
}
