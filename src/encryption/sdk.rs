//! Boundary to the encryption SDK. The session only needs three things from
//! it: an init entry point, instance creation from network configuration, and
//! an encrypted-input builder scoped to a (contract, account) pair.

use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use crate::wallet::WalletProvider;

/// Raw SDK failure. Never leaves the encryption session unwrapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SdkError(pub String);

/// Network configuration handed to instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkNetworkConfig {
    pub chain_id: u64,
    pub gateway_url: String,
    pub acl_address: Address,
}

/// Result of `encrypt`: one handle per added value plus a single proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EncryptedPayload {
    #[serde(default)]
    pub handles: Vec<Bytes>,
    #[serde(rename = "inputProof", default)]
    pub input_proof: Bytes,
}

#[async_trait]
pub trait EncryptionSdk: Send + Sync {
    async fn init(&self) -> Result<(), SdkError>;

    async fn create_instance(
        &self,
        config: &SdkNetworkConfig,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Arc<dyn EncryptionInstance>, SdkError>;
}

pub trait EncryptionInstance: Send + Sync {
    fn create_encrypted_input(&self, contract: Address, account: Address) -> Box<dyn EncryptedInput>;
}

#[async_trait]
pub trait EncryptedInput: Send {
    fn add64(&mut self, value: u64);

    async fn encrypt(&mut self) -> Result<EncryptedPayload, SdkError>;
}

/// SDK backed by a relayer service over HTTP.
pub struct RelayerSdk {
    client: Client,
    base_url: String,
}

impl RelayerSdk {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EncryptionSdk for RelayerSdk {
    async fn init(&self) -> Result<(), SdkError> {
        let url = format!("{}/v1/keyurl", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SdkError(format!("relayer unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(SdkError(format!("relayer key endpoint returned {}", response.status())));
        }
        debug!("Relayer public key endpoint reachable");
        Ok(())
    }

    async fn create_instance(
        &self,
        config: &SdkNetworkConfig,
        _provider: Arc<dyn WalletProvider>,
    ) -> Result<Arc<dyn EncryptionInstance>, SdkError> {
        Ok(Arc::new(RelayerInstance {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            config: config.clone(),
        }))
    }
}

struct RelayerInstance {
    client: Client,
    base_url: String,
    config: SdkNetworkConfig,
}

impl EncryptionInstance for RelayerInstance {
    fn create_encrypted_input(&self, contract: Address, account: Address) -> Box<dyn EncryptedInput> {
        Box::new(RelayerInput {
            client: self.client.clone(),
            url: format!("{}/v1/encrypt", self.base_url),
            request: EncryptRequest {
                contract_address: contract,
                user_address: account,
                contract_chain_id: self.config.chain_id,
                acl_address: self.config.acl_address,
                gateway_url: self.config.gateway_url.clone(),
                values: Vec::new(),
            },
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest {
    contract_address: Address,
    user_address: Address,
    contract_chain_id: u64,
    acl_address: Address,
    gateway_url: String,
    values: Vec<TypedValue>,
}

#[derive(Debug, Serialize)]
struct TypedValue {
    bits: u16,
    value: String,
}

struct RelayerInput {
    client: Client,
    url: String,
    request: EncryptRequest,
}

#[async_trait]
impl EncryptedInput for RelayerInput {
    fn add64(&mut self, value: u64) {
        self.request.values.push(TypedValue {
            bits: 64,
            value: value.to_string(),
        });
    }

    async fn encrypt(&mut self) -> Result<EncryptedPayload, SdkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.request)
            .send()
            .await
            .map_err(|e| SdkError(format!("relayer request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SdkError(format!("relayer returned {}", response.status())));
        }

        response
            .json::<EncryptedPayload>()
            .await
            .map_err(|e| SdkError(format!("invalid relayer response: {}", e)))
    }
}
