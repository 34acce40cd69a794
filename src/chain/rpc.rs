/// JSON-RPC chain client
///
/// One client serves every configured chain; requests are routed by chain id
/// to the matching endpoint. Transport failures, HTTP 429 and 5xx responses
/// are retried with capped exponential backoff before surfacing as
/// `TransientNetwork`.
use super::{
    abi, ChainReader, ChainWriter, ContractCall, PreparedTransaction, RawTransactionSender,
    ReceiptInfo, TransactionInfo,
};
use crate::{
    attestation::signer::TransactionSigner,
    error::{AttestError, AttestResult},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT_VALUE: &str = concat!("did-attest/", env!("CARGO_PKG_VERSION"));

/// Gas estimates are padded by this percentage
const GAS_LIMIT_HEADROOM_PERCENT: u64 = 20;

/// JSON-RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Endpoint URL per chain id
    pub endpoints: HashMap<u64, String>,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per retry, capped at 30s
    pub base_backoff: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
        }
    }
}

/// JSON-RPC client implementing the chain capabilities
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: String,
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    block_number: String,
    /// Absent on pre-Byzantium chains
    status: Option<String>,
}

impl RpcClient {
    /// Create a new JSON-RPC client
    pub fn new(config: RpcClientConfig) -> AttestResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AttestError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    fn endpoint(&self, chain_id: u64) -> AttestResult<&str> {
        self.config
            .endpoints
            .get(&chain_id)
            .map(String::as_str)
            .ok_or_else(|| {
                AttestError::Configuration(format!("No RPC endpoint configured for chain {}", chain_id))
            })
    }

    /// Make a JSON-RPC request with retry on transient failures
    async fn request(&self, chain_id: u64, method: &str, params: Value) -> AttestResult<Value> {
        let url = self.endpoint(chain_id)?;
        let mut retries = 0;

        loop {
            match self.request_once(url, method, &params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let backoff = self
                        .config
                        .base_backoff
                        .saturating_mul(2u32.saturating_pow(retries - 1))
                        .min(Duration::from_secs(30));

                    warn!(
                        error = %e,
                        method,
                        chain_id,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying RPC request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make a single JSON-RPC request without retry
    async fn request_once(&self, url: &str, method: &str, params: &Value) -> AttestResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC request");

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttestError::TransientNetwork(format!("{} failed: {}", method, e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AttestError::TransientNetwork(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }
        if !status.is_success() {
            return Err(AttestError::Rpc(format!("{} returned HTTP {}", method, status)));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| AttestError::Rpc(format!("Invalid {} response: {}", method, e)))?;

        if let Some(err) = rpc.error {
            return Err(AttestError::Rpc(format!(
                "{} error {}: {}",
                method, err.code, err.message
            )));
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    async fn request_string(&self, chain_id: u64, method: &str, params: Value) -> AttestResult<String> {
        match self.request(chain_id, method, params).await? {
            Value::String(s) => Ok(s),
            other => Err(AttestError::Rpc(format!(
                "{} returned non-string result: {}",
                method, other
            ))),
        }
    }

    async fn gas_price(&self, chain_id: u64) -> AttestResult<u128> {
        let price = self.request_string(chain_id, "eth_gasPrice", json!([])).await?;
        abi::parse_quantity(&price)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> AttestResult<u64> {
        let estimate = self
            .request_string(
                call.chain_id,
                "eth_estimateGas",
                json!([{
                    "from": call.from,
                    "to": call.to,
                    "data": abi::to_hex(&call.data),
                    "value": abi::format_quantity(call.value),
                }]),
            )
            .await?;
        let gas = abi::parse_quantity(&estimate)?;
        u64::try_from(gas).map_err(|_| AttestError::Rpc(format!("gas estimate {} overflows", gas)))
    }
}

fn parse_block(value: &str) -> AttestResult<u64> {
    let n = abi::parse_quantity(value)?;
    u64::try_from(n).map_err(|_| AttestError::Rpc(format!("block number {} overflows", value)))
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn call(&self, chain_id: u64, to: &str, data: &[u8]) -> AttestResult<Vec<u8>> {
        let result = self
            .request_string(
                chain_id,
                "eth_call",
                json!([{ "to": to, "data": abi::to_hex(data) }, "latest"]),
            )
            .await?;
        abi::from_hex(&result)
    }

    async fn storage_at(
        &self,
        chain_id: u64,
        address: &str,
        slot: &[u8; 32],
    ) -> AttestResult<[u8; 32]> {
        let result = self
            .request_string(
                chain_id,
                "eth_getStorageAt",
                json!([address, abi::to_hex(slot), "latest"]),
            )
            .await?;
        let bytes = abi::from_hex(&result)?;
        if bytes.len() > 32 {
            return Err(AttestError::Rpc(format!(
                "storage word has {} bytes",
                bytes.len()
            )));
        }
        let mut word = [0u8; 32];
        word[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(word)
    }

    async fn transaction(&self, chain_id: u64, hash: &str) -> AttestResult<Option<TransactionInfo>> {
        let result = self
            .request(chain_id, "eth_getTransactionByHash", json!([hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let tx: RpcTransaction = serde_json::from_value(result)
            .map_err(|e| AttestError::Rpc(format!("Invalid transaction object: {}", e)))?;

        Ok(Some(TransactionInfo {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            value: abi::parse_quantity(&tx.value)?,
            block_number: tx.block_number.as_deref().map(parse_block).transpose()?,
        }))
    }

    async fn receipt(&self, chain_id: u64, hash: &str) -> AttestResult<Option<ReceiptInfo>> {
        let result = self
            .request(chain_id, "eth_getTransactionReceipt", json!([hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: RpcReceipt = serde_json::from_value(result)
            .map_err(|e| AttestError::Rpc(format!("Invalid receipt object: {}", e)))?;

        let success = match receipt.status.as_deref() {
            Some(status) => abi::parse_quantity(status)? == 1,
            None => true,
        };

        Ok(Some(ReceiptInfo {
            block_number: parse_block(&receipt.block_number)?,
            success,
        }))
    }

    async fn block_number(&self, chain_id: u64) -> AttestResult<u64> {
        let result = self
            .request_string(chain_id, "eth_blockNumber", json!([]))
            .await?;
        parse_block(&result)
    }
}

#[async_trait]
impl ChainWriter for RpcClient {
    async fn prepare(&self, call: ContractCall) -> AttestResult<PreparedTransaction> {
        let estimate = self.estimate_gas(&call).await?;
        let gas_limit = estimate + estimate * GAS_LIMIT_HEADROOM_PERCENT / 100;
        let gas_price = self.gas_price(call.chain_id).await?;

        debug!(
            chain_id = call.chain_id,
            to = %call.to,
            gas_limit,
            gas_price,
            "prepared transaction"
        );

        Ok(PreparedTransaction {
            chain_id: call.chain_id,
            from: call.from,
            to: call.to,
            data: call.data,
            value: call.value,
            gas_limit,
            gas_price,
        })
    }

    async fn send(
        &self,
        tx: &PreparedTransaction,
        signer: &dyn TransactionSigner,
    ) -> AttestResult<String> {
        let hash = signer.submit(tx).await?;
        info!(
            chain_id = tx.chain_id,
            backend = ?signer.backend(),
            tx_hash = %hash,
            "transaction submitted"
        );
        Ok(hash)
    }
}

#[async_trait]
impl RawTransactionSender for RpcClient {
    async fn nonce(&self, chain_id: u64, address: &str) -> AttestResult<u64> {
        let result = self
            .request_string(
                chain_id,
                "eth_getTransactionCount",
                json!([address, "pending"]),
            )
            .await?;
        parse_block(&result)
    }

    async fn send_raw(&self, chain_id: u64, raw: &[u8]) -> AttestResult<String> {
        // Not retried: a resend after an ambiguous failure could double-spend the nonce slot
        let url = self.endpoint(chain_id)?;
        match self
            .request_once(url, "eth_sendRawTransaction", &json!([abi::to_hex(raw)]))
            .await?
        {
            Value::String(hash) => Ok(hash),
            other => Err(AttestError::Rpc(format!(
                "eth_sendRawTransaction returned {}",
                other
            ))),
        }
    }
}
