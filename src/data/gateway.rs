use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256, U64};
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use crate::data::decode::{contract_abi, decode_market, decode_market_ids, decode_position};
use crate::data::types::{EncryptedShare, MarketSnapshot, TxInclusion, UserPosition};
use crate::errors::{ConfigError, ReadError, SubmissionError, WalletError};
use crate::monitoring::metrics;
use crate::wallet::WalletProvider;

/// Unauthenticated `eth_call` transport for the read path.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;
}

#[async_trait]
impl ContractReader for Provider<Http> {
    async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Middleware::call(self, &tx, None).await
    }
}

/// Deployment settings for the gateway. Both fields are optional here so that
/// a missing value is reported on first use rather than at startup.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub contract_address: Option<String>,
    pub public_rpc_url: Option<String>,
    pub confirm_poll: Duration,
    pub confirm_timeout: Duration,
}

impl GatewaySettings {
    pub fn contract(&self) -> Result<Address, ConfigError> {
        let raw = self
            .contract_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingContractAddress)?;

        raw.parse::<Address>()
            .map_err(|_| ConfigError::InvalidAddress(raw.to_string()))
    }

    fn rpc_url(&self) -> Result<&str, ConfigError> {
        self.public_rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRpcUrl)
    }
}

struct ReadPath {
    reader: Arc<dyn ContractReader>,
    contract: Address,
    abi: Abi,
}

struct WritePath {
    wallet: Arc<dyn WalletProvider>,
    contract: Address,
    abi: Abi,
}

/// Typed access to the market contract.
///
/// Single market and position reads fail soft (`None`, logged), writes fail
/// loud (`SubmissionError`). Both invocation paths are resolved on first use.
pub struct ContractGateway {
    settings: GatewaySettings,
    wallet: Option<Arc<dyn WalletProvider>>,
    reader_override: Option<Arc<dyn ContractReader>>,
    read_path: OnceCell<ReadPath>,
    write_path: OnceCell<WritePath>,
}

impl ContractGateway {
    pub fn new(settings: GatewaySettings, wallet: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            settings,
            wallet,
            reader_override: None,
            read_path: OnceCell::new(),
            write_path: OnceCell::new(),
        }
    }

    /// Use a custom read transport instead of the public RPC endpoint.
    pub fn with_reader(
        settings: GatewaySettings,
        reader: Arc<dyn ContractReader>,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> Self {
        Self {
            reader_override: Some(reader),
            ..Self::new(settings, wallet)
        }
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        self.settings.contract()
    }

    async fn read_path(&self) -> Result<&ReadPath, ConfigError> {
        self.read_path
            .get_or_try_init(|| async {
                let contract = self.settings.contract()?;
                let reader: Arc<dyn ContractReader> = match &self.reader_override {
                    Some(reader) => Arc::clone(reader),
                    None => {
                        let url = self.settings.rpc_url()?;
                        let provider = Provider::<Http>::try_from(url)
                            .map_err(|e| ConfigError::InvalidRpcUrl(url.to_string(), e.to_string()))?;
                        info!("Read path connected to {}", url);
                        Arc::new(provider)
                    }
                };
                Ok::<_, ConfigError>(ReadPath {
                    reader,
                    contract,
                    abi: contract_abi()?,
                })
            })
            .await
    }

    async fn write_path(&self) -> Result<&WritePath, SubmissionError> {
        self.write_path
            .get_or_try_init(|| async {
                let contract = self.settings.contract()?;
                let wallet = self.wallet.clone().ok_or(WalletError::NoProvider)?;
                Ok::<_, SubmissionError>(WritePath {
                    wallet,
                    contract,
                    abi: contract_abi()?,
                })
            })
            .await
    }

    /// Call a view method and return its raw output tokens.
    async fn view(&self, method: &'static str, args: &[Token]) -> Result<Vec<Token>, ReadError> {
        let path = self.read_path().await?;
        let function = path.abi.function(method).map_err(|e| ReadError::Rpc {
            method,
            message: e.to_string(),
        })?;
        let data = function.encode_input(args).map_err(|e| ReadError::Rpc {
            method,
            message: e.to_string(),
        })?;

        let output = path
            .reader
            .eth_call(path.contract, data.into())
            .await
            .map_err(|e| ReadError::Rpc {
                method,
                message: e.to_string(),
            })?;

        function.decode_output(&output).map_err(|e| ReadError::Rpc {
            method,
            message: format!("undecodable output: {}", e),
        })
    }

    pub async fn list_market_ids(&self) -> Result<Vec<String>, ReadError> {
        let raw = self.view("listMarkets", &[]).await?;
        Ok(decode_market_ids(&raw)?)
    }

    pub async fn get_market(&self, id: &str) -> Result<MarketSnapshot, ReadError> {
        let raw = self.view("getMarket", &[Token::String(id.to_string())]).await?;
        Ok(decode_market(id, &raw)?)
    }

    /// Every market, fetched concurrently after one listing call.
    pub async fn fetch_markets(&self) -> Result<Vec<MarketSnapshot>, ReadError> {
        let ids = self.list_market_ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = ids.len(), "Fetching markets");

        try_join_all(ids.iter().map(|id| self.get_market(id))).await
    }

    /// One market, or `None` when the id is empty or the read fails.
    pub async fn fetch_market_by_id(&self, id: &str) -> Option<MarketSnapshot> {
        if id.is_empty() {
            return None;
        }
        match self.get_market(id).await {
            Ok(market) => Some(market),
            Err(e) => {
                warn!("Failed to fetch market {}: {}", id, e);
                metrics::record_read_failure("getMarket");
                None
            }
        }
    }

    /// An account's position, or `None` when the read fails.
    pub async fn get_position(&self, market_id: &str, account: Address) -> Option<UserPosition> {
        if market_id.is_empty() {
            return None;
        }
        let args = [Token::String(market_id.to_string()), Token::Address(account)];
        let result = match self.view("getPosition", &args).await {
            Ok(raw) => decode_position(&raw).map_err(ReadError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(position) => Some(position),
            Err(e) => {
                warn!("Failed to fetch position {} for {:?}: {}", market_id, account, e);
                metrics::record_read_failure("getPosition");
                None
            }
        }
    }

    /// Send `placePosition` through the wallet with `entry_fee` attached.
    pub async fn submit_position(
        &self,
        market_id: &str,
        vote_yes: bool,
        share: &EncryptedShare,
        entry_fee: U256,
    ) -> Result<PendingPosition, SubmissionError> {
        let path = self.write_path().await?;
        if share.contract != path.contract {
            return Err(SubmissionError::ShareBinding {
                bound: share.contract,
                expected: path.contract,
            });
        }

        let function = path
            .abi
            .function("placePosition")
            .map_err(|e| SubmissionError::Encode(e.to_string()))?;
        let data = function
            .encode_input(&[
                Token::String(market_id.to_string()),
                Token::Bool(vote_yes),
                Token::FixedBytes(share.handle.as_bytes().to_vec()),
                Token::Bytes(share.proof.to_vec()),
            ])
            .map_err(|e| SubmissionError::Encode(e.to_string()))?;

        let tx = TransactionRequest::new()
            .from(share.account)
            .to(path.contract)
            .data(data)
            .value(entry_fee);

        let value = path
            .wallet
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(SubmissionError::from_signing)?;
        let tx_hash: TxHash = serde_json::from_value(value).map_err(|e| {
            SubmissionError::Wallet(WalletError::InvalidResponse {
                method: "eth_sendTransaction".to_string(),
                message: e.to_string(),
            })
        })?;

        info!("placePosition submitted for {}: {:?}", market_id, tx_hash);
        Ok(PendingPosition {
            tx_hash,
            wallet: Arc::clone(&path.wallet),
            poll: self.settings.confirm_poll,
            timeout: self.settings.confirm_timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptView {
    block_number: Option<U64>,
    status: Option<U64>,
}

/// A signed transaction waiting for inclusion.
pub struct PendingPosition {
    pub tx_hash: TxHash,
    wallet: Arc<dyn WalletProvider>,
    poll: Duration,
    timeout: Duration,
}

impl PendingPosition {
    /// Poll for the receipt until it lands or the timeout passes.
    pub async fn confirm(self) -> Result<TxInclusion, SubmissionError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let value = match self
                .wallet
                .request("eth_getTransactionReceipt", json!([self.tx_hash]))
                .await
            {
                Ok(value) => value,
                // The transaction may still land; keep polling until the deadline
                Err(WalletError::Transport { message, .. }) => {
                    warn!("Receipt lookup for {:?} failed: {}", self.tx_hash, message);
                    Value::Null
                }
                Err(e) => return Err(e.into()),
            };

            if !value.is_null() {
                let receipt: ReceiptView = serde_json::from_value(value).map_err(|e| {
                    SubmissionError::Wallet(WalletError::InvalidResponse {
                        method: "eth_getTransactionReceipt".to_string(),
                        message: e.to_string(),
                    })
                })?;

                // Pending-block receipts carry no block number yet
                if let Some(block) = receipt.block_number {
                    if receipt.status == Some(U64::zero()) {
                        return Err(SubmissionError::Reverted(self.tx_hash));
                    }
                    return Ok(TxInclusion {
                        tx_hash: self.tx_hash,
                        block_number: block.as_u64(),
                    });
                }
            }

            if Instant::now() >= deadline {
                return Err(SubmissionError::Dropped(self.tx_hash, self.timeout.as_secs()));
            }
            tokio::time::sleep(self.poll).await;
        }
    }
}
