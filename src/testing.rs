//! In-memory wallet, contract and encryption SDK used across unit tests.

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::providers::ProviderError;
use ethers::types::{Address, Bytes, TxHash, H256, U256};
use ethers::utils::parse_ether;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use crate::data::decode::contract_abi;
use crate::data::gateway::ContractReader;
use crate::data::types::{MarketSnapshot, UserPosition};
use crate::encryption::sdk::{
    EncryptedInput, EncryptedPayload, EncryptionInstance, EncryptionSdk, SdkError, SdkNetworkConfig,
};
use crate::errors::{WalletError, USER_REJECTED_REQUEST};
use crate::network::{parse_chain_id, UNRECOGNIZED_CHAIN};
use crate::wallet::WalletProvider;

pub fn sample_market(id: &str) -> MarketSnapshot {
    MarketSnapshot {
        id: id.to_string(),
        question: format!("Will {} resolve YES?", id),
        category: "Crypto".to_string(),
        rules: "Resolves YES if the oracle reports above the threshold".to_string(),
        oracle_uri: "https://www.coingecko.com/en/coins/bitcoin".to_string(),
        creator: Address::from_low_u64_be(0xbeef),
        entry_fee: parse_ether("0.01").unwrap(),
        lock_time: 1_900_000_000,
        yes_pool: parse_ether(3).unwrap(),
        no_pool: parse_ether(1).unwrap(),
        cancelled: false,
        resolved: false,
        decryptable: false,
        outcome_yes: false,
        push_all: false,
        winner_count: 0,
        revealed_yes: 0,
        revealed_no: 0,
    }
}

fn rpc_error(method: &str, code: i64, message: &str) -> WalletError {
    WalletError::Rpc {
        method: method.to_string(),
        code,
        message: message.to_string(),
    }
}

type SendHook = Box<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct WalletState {
    chain_id: u64,
    known_chains: HashSet<u64>,
    accounts: Vec<Address>,
    granted: Option<Vec<Address>>,
    calls: Vec<(String, Value)>,
    sent: Vec<Value>,
    receipts: HashMap<TxHash, u64>,
    next_block: u64,
    fail_add: Option<String>,
    fail_switch: Option<(i64, String)>,
    reject: Option<String>,
    revert: bool,
    withhold: bool,
    receipt_outages: usize,
}

/// Scriptable EIP-1193 wallet.
pub struct FakeWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<Vec<Address>>,
    on_send: Mutex<Option<SendHook>>,
}

/// Decoded `placePosition` transaction.
#[derive(Debug)]
pub struct PlacedCall {
    pub market_id: String,
    pub vote_yes: bool,
    pub handle: H256,
    pub proof: Vec<u8>,
    pub value: U256,
    pub to: Address,
    pub from: Address,
}

impl FakeWallet {
    pub fn on_chain(chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(WalletState {
                chain_id,
                known_chains: HashSet::from([chain_id]),
                next_block: 100,
                ..Default::default()
            }),
            events,
            on_send: Mutex::new(None),
        }
    }

    pub fn knowing(self, chain_id: u64) -> Self {
        self.state.lock().unwrap().known_chains.insert(chain_id);
        self
    }

    pub fn with_accounts(self, accounts: Vec<Address>) -> Self {
        self.state.lock().unwrap().accounts = accounts;
        self
    }

    /// Accounts handed out on the next `eth_requestAccounts`.
    pub fn grant_on_request(&self, accounts: Vec<Address>) {
        self.state.lock().unwrap().granted = Some(accounts);
    }

    pub fn emit_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().unwrap().accounts = accounts.clone();
        let _ = self.events.send(accounts);
    }

    /// Switch accounts without an `accountsChanged` event.
    pub fn set_accounts_silently(&self, accounts: Vec<Address>) {
        self.state.lock().unwrap().accounts = accounts;
    }

    /// Fail the next `count` receipt lookups at the transport level.
    pub fn drop_receipt_lookups(&self, count: usize) {
        self.state.lock().unwrap().receipt_outages = count;
    }

    pub fn fail_add(&self, message: &str) {
        self.state.lock().unwrap().fail_add = Some(message.to_string());
    }

    pub fn fail_switch(&self, code: i64, message: &str) {
        self.state.lock().unwrap().fail_switch = Some((code, message.to_string()));
    }

    pub fn reject_transactions(&self, message: &str) {
        self.state.lock().unwrap().reject = Some(message.to_string());
    }

    pub fn revert_transactions(&self) {
        self.state.lock().unwrap().revert = true;
    }

    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold = true;
    }

    /// Run `hook` with each accepted transaction, before its hash is returned.
    pub fn on_send(&self, hook: impl Fn(&Value) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn chain_id(&self) -> u64 {
        self.state.lock().unwrap().chain_id
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|(m, _)| m == method).count()
    }

    /// Params of the first call to `method`.
    pub fn params_of(&self, method: &str) -> Value {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .unwrap_or(Value::Null)
    }

    pub fn sent_transactions(&self) -> Vec<Value> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn decode_place_position(tx: &Value) -> PlacedCall {
        let data: Bytes = serde_json::from_value(tx["data"].clone()).unwrap();
        let value: U256 = serde_json::from_value(tx["value"].clone()).unwrap_or_default();
        let to: Address = serde_json::from_value(tx["to"].clone()).unwrap();
        let from: Address = serde_json::from_value(tx["from"].clone()).unwrap();

        let abi = contract_abi().unwrap();
        let function = abi.function("placePosition").unwrap();
        assert_eq!(&data[..4], function.short_signature().as_slice());
        let tokens = function.decode_input(&data[4..]).unwrap();

        match tokens.as_slice() {
            [Token::String(market_id), Token::Bool(vote_yes), Token::FixedBytes(handle), Token::Bytes(proof)] => {
                PlacedCall {
                    market_id: market_id.clone(),
                    vote_yes: *vote_yes,
                    handle: H256::from_slice(handle),
                    proof: proof.clone(),
                    value,
                    to,
                    from,
                }
            }
            other => panic!("unexpected placePosition arguments: {:?}", other),
        }
    }

    fn send_transaction(&self, params: &Value) -> Result<Value, WalletError> {
        let tx = params[0].clone();
        {
            let state = self.state.lock().unwrap();
            if let Some(message) = &state.reject {
                return Err(rpc_error("eth_sendTransaction", USER_REJECTED_REQUEST, message));
            }
        }

        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook(&tx);
        }

        let mut state = self.state.lock().unwrap();
        let hash = TxHash::random();
        state.next_block += 1;
        let block = state.next_block;
        state.receipts.insert(hash, block);
        state.sent.push(tx);
        Ok(json!(hash))
    }

    fn receipt(&self, params: &Value) -> Result<Value, WalletError> {
        let hash: TxHash = serde_json::from_value(params[0].clone()).map_err(|e| WalletError::InvalidResponse {
            method: "eth_getTransactionReceipt".to_string(),
            message: e.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        if state.receipt_outages > 0 {
            state.receipt_outages -= 1;
            return Err(WalletError::Transport {
                method: "eth_getTransactionReceipt".to_string(),
                message: "connection reset".to_string(),
            });
        }
        if state.withhold {
            return Ok(Value::Null);
        }
        Ok(match state.receipts.get(&hash) {
            Some(block) => json!({
                "transactionHash": hash,
                "blockNumber": format!("{:#x}", block),
                "status": if state.revert { "0x0" } else { "0x1" },
            }),
            None => Value::Null,
        })
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((method.to_string(), params.clone()));

        match method {
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id()))),
            "eth_accounts" => Ok(json!(self.state.lock().unwrap().accounts)),
            "eth_requestAccounts" => {
                let mut state = self.state.lock().unwrap();
                if let Some(granted) = state.granted.take() {
                    state.accounts = granted;
                }
                Ok(json!(state.accounts))
            }
            "wallet_switchEthereumChain" => {
                let mut state = self.state.lock().unwrap();
                if let Some((code, message)) = &state.fail_switch {
                    return Err(rpc_error(method, *code, message));
                }
                let target = parse_chain_id(&params[0]["chainId"]).unwrap_or_default();
                if !state.known_chains.contains(&target) {
                    return Err(rpc_error(method, UNRECOGNIZED_CHAIN, "Unrecognized chain ID"));
                }
                state.chain_id = target;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let mut state = self.state.lock().unwrap();
                if let Some(message) = &state.fail_add {
                    return Err(rpc_error(method, USER_REJECTED_REQUEST, message));
                }
                let chain = parse_chain_id(&params[0]["chainId"]).unwrap_or_default();
                state.known_chains.insert(chain);
                Ok(Value::Null)
            }
            "eth_sendTransaction" => self.send_transaction(&params),
            "eth_getTransactionReceipt" => self.receipt(&params),
            other => Err(rpc_error(other, -32601, "Method not found")),
        }
    }

    fn accounts_changed(&self) -> Option<broadcast::Receiver<Vec<Address>>> {
        Some(self.events.subscribe())
    }
}

#[derive(Default)]
struct ReaderState {
    markets: Vec<MarketSnapshot>,
    positions: HashMap<(String, Address), UserPosition>,
    failing: HashSet<String>,
    calls: Vec<String>,
}

/// Market contract served from memory through real ABI encoding.
#[derive(Default)]
pub struct FakeReader {
    state: Mutex<ReaderState>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract() -> Address {
        Address::from_low_u64_be(0xc0ffee)
    }

    /// Insert or overwrite a market, keeping listing order.
    pub fn put_market(&self, market: MarketSnapshot) {
        let mut state = self.state.lock().unwrap();
        match state.markets.iter_mut().find(|m| m.id == market.id) {
            Some(existing) => *existing = market,
            None => state.markets.push(market),
        }
    }

    pub fn market(&self, id: &str) -> Option<MarketSnapshot> {
        self.state.lock().unwrap().markets.iter().find(|m| m.id == id).cloned()
    }

    pub fn put_position(&self, market_id: &str, account: Address, position: UserPosition) {
        self.state
            .lock()
            .unwrap()
            .positions
            .insert((market_id.to_string(), account), position);
    }

    /// Make every later call to `method` fail.
    pub fn fail(&self, method: &str) {
        self.state.lock().unwrap().failing.insert(method.to_string());
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|m| *m == method).count()
    }

    fn respond(&self, method: &str, args: &[Token]) -> Result<Vec<Token>, String> {
        let state = self.state.lock().unwrap();
        match (method, args) {
            ("listMarkets", []) => Ok(vec![Token::Array(
                state.markets.iter().map(|m| Token::String(m.id.clone())).collect(),
            )]),
            ("getMarket", [Token::String(id)]) => state
                .markets
                .iter()
                .find(|m| &m.id == id)
                .map(market_tokens)
                .ok_or_else(|| "execution reverted: unknown market".to_string()),
            ("getPosition", [Token::String(id), Token::Address(account)]) => {
                let position = state
                    .positions
                    .get(&(id.clone(), *account))
                    .cloned()
                    .unwrap_or_default();
                Ok(vec![
                    Token::Bool(position.exists),
                    Token::Bool(position.vote_yes),
                    Token::Bool(position.claimed),
                    Token::Uint(position.stake),
                ])
            }
            _ => Err(format!("unsupported call {}", method)),
        }
    }
}

fn market_tokens(m: &MarketSnapshot) -> Vec<Token> {
    vec![
        Token::String(m.question.clone()),
        Token::String(m.category.clone()),
        Token::String(m.rules.clone()),
        Token::String(m.oracle_uri.clone()),
        Token::Address(m.creator),
        Token::Uint(m.entry_fee),
        Token::Uint(U256::from(m.lock_time)),
        Token::Uint(m.yes_pool),
        Token::Uint(m.no_pool),
        Token::Bool(m.cancelled),
        Token::Bool(m.resolved),
        Token::Bool(m.decryptable),
        Token::Bool(m.outcome_yes),
        Token::Bool(m.push_all),
        Token::Uint(U256::from(m.winner_count)),
        Token::Uint(U256::from(m.revealed_yes)),
        Token::Uint(U256::from(m.revealed_no)),
    ]
}

#[async_trait]
impl ContractReader for FakeReader {
    async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        assert_eq!(to, Self::contract());
        let abi = contract_abi().map_err(|e| ProviderError::CustomError(e.to_string()))?;
        let function = abi
            .functions()
            .find(|f| data.len() >= 4 && f.short_signature() == data[..4])
            .ok_or_else(|| ProviderError::CustomError("unknown selector".to_string()))?;

        let method = function.name.clone();
        let failing = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(method.clone());
            state.failing.contains(&method)
        };
        if failing {
            return Err(ProviderError::CustomError(format!("{} unavailable", method)));
        }

        let args = function
            .decode_input(&data[4..])
            .map_err(|e| ProviderError::CustomError(e.to_string()))?;
        let tokens = self.respond(&method, &args).map_err(ProviderError::CustomError)?;
        Ok(encode(&tokens).into())
    }
}

#[derive(Default)]
struct SdkState {
    init_error: Option<String>,
    encrypt_error: Option<String>,
    payload: Option<EncryptedPayload>,
    added: Vec<(Address, Address, u64)>,
}

/// Encryption SDK producing random well-formed handles and proofs.
#[derive(Default)]
pub struct FakeSdk {
    state: Arc<Mutex<SdkState>>,
    instances: AtomicUsize,
    init_delay: Duration,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn fail_init(&self, message: &str) {
        self.state.lock().unwrap().init_error = Some(message.to_string());
    }

    pub fn fail_encrypt(&self, message: &str) {
        self.state.lock().unwrap().encrypt_error = Some(message.to_string());
    }

    /// Answer every `encrypt` with `payload` instead of random bytes.
    pub fn respond_with(&self, payload: EncryptedPayload) {
        self.state.lock().unwrap().payload = Some(payload);
    }

    pub fn instances_created(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    /// Every `(contract, account, value)` that was encrypted.
    pub fn added(&self) -> Vec<(Address, Address, u64)> {
        self.state.lock().unwrap().added.clone()
    }
}

#[async_trait]
impl EncryptionSdk for FakeSdk {
    async fn init(&self) -> Result<(), SdkError> {
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        match &self.state.lock().unwrap().init_error {
            Some(message) => Err(SdkError(message.clone())),
            None => Ok(()),
        }
    }

    async fn create_instance(
        &self,
        _config: &SdkNetworkConfig,
        _provider: Arc<dyn WalletProvider>,
    ) -> Result<Arc<dyn EncryptionInstance>, SdkError> {
        self.instances.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeInstance {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeInstance {
    state: Arc<Mutex<SdkState>>,
}

impl EncryptionInstance for FakeInstance {
    fn create_encrypted_input(&self, contract: Address, account: Address) -> Box<dyn EncryptedInput> {
        Box::new(FakeInput {
            state: Arc::clone(&self.state),
            contract,
            account,
            values: Vec::new(),
        })
    }
}

struct FakeInput {
    state: Arc<Mutex<SdkState>>,
    contract: Address,
    account: Address,
    values: Vec<u64>,
}

#[async_trait]
impl EncryptedInput for FakeInput {
    fn add64(&mut self, value: u64) {
        self.values.push(value);
    }

    async fn encrypt(&mut self) -> Result<EncryptedPayload, SdkError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.encrypt_error {
            return Err(SdkError(message.clone()));
        }
        for value in &self.values {
            state.added.push((self.contract, self.account, *value));
        }
        if let Some(payload) = &state.payload {
            return Ok(payload.clone());
        }

        let mut rng = rand::thread_rng();
        let handles = self
            .values
            .iter()
            .map(|_| {
                let mut handle = [0u8; 32];
                rng.fill(&mut handle[..]);
                handle[0] |= 1;
                Bytes::from(handle.to_vec())
            })
            .collect();
        let proof: Vec<u8> = (0..96).map(|_| rng.gen()).collect();

        Ok(EncryptedPayload {
            handles,
            input_proof: Bytes::from(proof),
        })
    }
}
