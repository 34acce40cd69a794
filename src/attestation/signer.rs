/// Transaction signing backends
///
/// Two backends exist: a custodial wallet API that signs and broadcasts on
/// our behalf, and a local secp256k1 key that signs EIP-155 legacy
/// transactions and broadcasts them through the RPC node. The backend is
/// chosen once per pipeline run by [`SignerSelector`].
use crate::{
    caip10,
    chain::{abi, PreparedTransaction, RawTransactionSender},
    error::{AttestError, AttestResult},
};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Which backend signed a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerBackend {
    Custodial,
    LocalKey,
}

impl SignerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerBackend::Custodial => "custodial",
            SignerBackend::LocalKey => "local-key",
        }
    }
}

impl fmt::Display for SignerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signs and broadcasts prepared transactions
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn backend(&self) -> SignerBackend;

    /// Account the transactions are sent from
    fn address(&self) -> &str;

    /// Sign and broadcast, returning the transaction hash
    async fn submit(&self, tx: &PreparedTransaction) -> AttestResult<String>;
}

/// Custodial wallet API settings
#[derive(Clone)]
pub struct CustodialConfig {
    pub api_url: String,
    pub api_key: String,
    pub wallet_address: String,
}

impl fmt::Debug for CustodialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodialConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("wallet_address", &self.wallet_address)
            .finish()
    }
}

/// Signer selection inputs
#[derive(Clone, Default)]
pub struct SignerConfig {
    pub custodial: Option<CustodialConfig>,
    /// Hex-encoded secp256k1 private key
    pub private_key: Option<String>,
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("custodial", &self.custodial)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Wallet API signer
pub struct CustodialSigner {
    http: reqwest::Client,
    config: CustodialConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustodialResponse {
    transaction_hash: String,
}

impl CustodialSigner {
    pub fn new(config: CustodialConfig) -> AttestResult<Self> {
        caip10::validate_evm_address(&config.wallet_address)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AttestError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl TransactionSigner for CustodialSigner {
    fn backend(&self) -> SignerBackend {
        SignerBackend::Custodial
    }

    fn address(&self) -> &str {
        &self.config.wallet_address
    }

    async fn submit(&self, tx: &PreparedTransaction) -> AttestResult<String> {
        let url = format!("{}/v1/transactions", self.config.api_url.trim_end_matches('/'));
        let body = json!({
            "chainId": tx.chain_id,
            "from": self.config.wallet_address,
            "to": tx.to,
            "data": abi::to_hex(&tx.data),
            "value": abi::format_quantity(tx.value),
            "gasLimit": abi::format_quantity(u128::from(tx.gas_limit)),
            "gasPrice": abi::format_quantity(tx.gas_price),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttestError::TransientNetwork(format!("Custodial API request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AttestError::TransientNetwork(format!(
                "Custodial API returned HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AttestError::Rpc(format!(
                "Custodial API rejected transaction (HTTP {}): {}",
                status, text
            )));
        }

        let parsed: CustodialResponse = response
            .json()
            .await
            .map_err(|e| AttestError::Rpc(format!("Invalid custodial API response: {}", e)))?;
        abi::validate_tx_hash(&parsed.transaction_hash)?;
        Ok(parsed.transaction_hash)
    }
}

/// Local secp256k1 key signing EIP-155 legacy transactions
///
/// The pending nonce is read once per chain and then advanced locally, so
/// sequential writes from one signer never depend on a lagging mempool.
pub struct LocalKeySigner {
    key: SigningKey,
    address: String,
    sender: Arc<dyn RawTransactionSender>,
    next_nonce: Mutex<HashMap<u64, u64>>,
}

impl LocalKeySigner {
    pub fn new(private_key: &str, sender: Arc<dyn RawTransactionSender>) -> AttestResult<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|_| AttestError::Configuration("Signer private key is not hex".to_string()))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| AttestError::Configuration("Signer private key is invalid".to_string()))?;
        let address = address_of(&key)?;

        Ok(Self {
            key,
            address,
            sender,
            next_nonce: Mutex::new(HashMap::new()),
        })
    }

    /// RLP-encoded signed transaction
    pub fn sign(&self, tx: &PreparedTransaction, nonce: u64) -> AttestResult<Vec<u8>> {
        let to = abi::from_hex(&tx.to)?;
        let fields = |v: u128, r: &[u8], s: &[u8]| {
            vec![
                rlp::uint(u128::from(nonce)),
                rlp::uint(tx.gas_price),
                rlp::uint(u128::from(tx.gas_limit)),
                rlp::bytes(&to),
                rlp::uint(tx.value),
                rlp::bytes(&tx.data),
                rlp::uint(v),
                rlp::bytes(r),
                rlp::bytes(s),
            ]
        };

        let unsigned = rlp::list(&fields(u128::from(tx.chain_id), &[], &[]));
        let hash = abi::keccak256(&unsigned);

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| AttestError::Internal(format!("Signing failed: {}", e)))?;
        let sig = signature.to_bytes();
        let v = u128::from(recovery_id.to_byte()) + u128::from(tx.chain_id) * 2 + 35;

        Ok(rlp::list(&fields(
            v,
            rlp::trim_leading_zeros(&sig[..32]),
            rlp::trim_leading_zeros(&sig[32..]),
        )))
    }
}

#[async_trait]
impl TransactionSigner for LocalKeySigner {
    fn backend(&self) -> SignerBackend {
        SignerBackend::LocalKey
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn submit(&self, tx: &PreparedTransaction) -> AttestResult<String> {
        // Held across the broadcast so nonces are handed out in order
        let mut next_nonce = self.next_nonce.lock().await;
        let nonce = match next_nonce.get(&tx.chain_id) {
            Some(nonce) => *nonce,
            None => self.sender.nonce(tx.chain_id, &self.address).await?,
        };

        let raw = self.sign(tx, nonce)?;
        debug!(chain_id = tx.chain_id, nonce, "broadcasting signed transaction");
        match self.sender.send_raw(tx.chain_id, &raw).await {
            Ok(hash) => {
                next_nonce.insert(tx.chain_id, nonce + 1);
                Ok(hash)
            }
            Err(e) => {
                // Unknown whether the node took it; re-read next time
                next_nonce.remove(&tx.chain_id);
                Err(e)
            }
        }
    }
}

/// Checksummed address of a signing key
fn address_of(key: &SigningKey) -> AttestResult<String> {
    let point = key.verifying_key().as_affine().to_encoded_point(false);
    let hash = abi::keccak256(&point.as_bytes()[1..]);
    Ok(caip10::to_checksum_address(&abi::to_hex(&hash[12..]))?)
}

/// Picks the signing backend: custodial when configured, else the local key
#[derive(Clone)]
pub struct SignerSelector {
    config: SignerConfig,
    sender: Arc<dyn RawTransactionSender>,
}

impl SignerSelector {
    pub fn new(config: SignerConfig, sender: Arc<dyn RawTransactionSender>) -> Self {
        Self { config, sender }
    }

    pub fn is_configured(&self) -> bool {
        self.config.custodial.is_some() || self.config.private_key.is_some()
    }

    pub fn select(&self) -> AttestResult<Arc<dyn TransactionSigner>> {
        if let Some(custodial) = &self.config.custodial {
            let signer = CustodialSigner::new(custodial.clone())?;
            info!(address = %signer.address(), "using custodial signer");
            return Ok(Arc::new(signer));
        }

        if let Some(private_key) = &self.config.private_key {
            let signer = LocalKeySigner::new(private_key, self.sender.clone())?;
            info!(address = %signer.address(), "using local key signer");
            return Ok(Arc::new(signer));
        }

        Err(AttestError::Configuration(
            "No transaction signer configured; set a custodial API or a signer private key"
                .to_string(),
        ))
    }
}

/// Minimal RLP encoding for legacy transactions
mod rlp {
    pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        &bytes[start..]
    }

    pub fn uint(value: u128) -> Vec<u8> {
        bytes(trim_leading_zeros(&value.to_be_bytes()))
    }

    pub fn bytes(data: &[u8]) -> Vec<u8> {
        if data.len() == 1 && data[0] < 0x80 {
            return vec![data[0]];
        }
        let mut out = header(data.len(), 0x80);
        out.extend_from_slice(data);
        out
    }

    pub fn list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload: Vec<u8> = items.concat();
        let mut out = header(payload.len(), 0xc0);
        out.extend(payload);
        out
    }

    fn header(len: usize, offset: u8) -> Vec<u8> {
        if len < 56 {
            return vec![offset + len as u8];
        }
        let len_bytes = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(len_bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRawSender;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Test vector from EIP-155
    const EIP155_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
    const EIP155_SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

    fn eip155_tx() -> PreparedTransaction {
        PreparedTransaction {
            chain_id: 1,
            from: String::new(),
            to: format!("0x{}", "35".repeat(20)),
            data: vec![],
            value: 1_000_000_000_000_000_000,
            gas_limit: 21_000,
            gas_price: 20_000_000_000,
        }
    }

    #[test]
    fn test_rlp_short_and_long_strings() {
        assert_eq!(rlp::uint(0), vec![0x80]);
        assert_eq!(rlp::uint(0x7f), vec![0x7f]);
        assert_eq!(rlp::uint(0x80), vec![0x81, 0x80]);
        assert_eq!(rlp::uint(1024), vec![0x82, 0x04, 0x00]);

        let long = rlp::bytes(&[0xaa; 60]);
        assert_eq!(&long[..2], &[0xb8, 60]);
        assert_eq!(long.len(), 62);
    }

    #[test]
    fn test_address_derivation() {
        let key = format!("0x{:0>64}", "1");
        let signer = LocalKeySigner::new(&key, Arc::new(FakeRawSender::default())).unwrap();
        assert_eq!(signer.address(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }

    #[test]
    fn test_eip155_signing_vector() {
        let signer = LocalKeySigner::new(EIP155_KEY, Arc::new(FakeRawSender::default())).unwrap();
        let raw = signer.sign(&eip155_tx(), 9).unwrap();
        assert_eq!(hex::encode(raw), EIP155_SIGNED);
    }

    #[test]
    fn test_bad_key_is_configuration_error() {
        let err = LocalKeySigner::new("not-hex", Arc::new(FakeRawSender::default()))
            .err()
            .unwrap();
        assert!(matches!(err, AttestError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_local_submit_uses_pending_nonce() {
        let sender = Arc::new(FakeRawSender::default().with_nonce(9));
        let signer = LocalKeySigner::new(EIP155_KEY, sender.clone()).unwrap();

        let hash = signer.submit(&eip155_tx()).await.unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(hex::encode(&sender.sent()[0]), EIP155_SIGNED);
    }

    #[tokio::test]
    async fn test_local_submit_advances_nonce_locally() {
        let sender = Arc::new(FakeRawSender::default().with_nonce(9));
        let signer = LocalKeySigner::new(EIP155_KEY, sender.clone()).unwrap();

        signer.submit(&eip155_tx()).await.unwrap();
        signer.submit(&eip155_tx()).await.unwrap();

        assert_eq!(sender.nonce_reads(), 1);
        let sent = sender.sent();
        assert_eq!(hex::encode(&sent[0]), EIP155_SIGNED);
        assert_eq!(sent[1], signer.sign(&eip155_tx(), 10).unwrap());
    }

    #[tokio::test]
    async fn test_custodial_submit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({ "chainId": 1, "to": eip155_tx().to })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transactionHash": format!("0x{}", "ef".repeat(32))
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = CustodialSigner::new(CustodialConfig {
            api_url: server.uri(),
            api_key: "secret".to_string(),
            wallet_address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
        })
        .unwrap();

        let hash = signer.submit(&eip155_tx()).await.unwrap();
        assert_eq!(hash, format!("0x{}", "ef".repeat(32)));
    }

    #[tokio::test]
    async fn test_custodial_rejection_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("wallet locked"))
            .mount(&server)
            .await;

        let signer = CustodialSigner::new(CustodialConfig {
            api_url: server.uri(),
            api_key: "secret".to_string(),
            wallet_address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
        })
        .unwrap();

        let err = signer.submit(&eip155_tx()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("wallet locked"));
    }

    #[test]
    fn test_selector_prefers_custodial() {
        let sender = Arc::new(FakeRawSender::default());
        let selector = SignerSelector::new(
            SignerConfig {
                custodial: Some(CustodialConfig {
                    api_url: "https://wallet.example".to_string(),
                    api_key: "k".to_string(),
                    wallet_address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
                }),
                private_key: Some(EIP155_KEY.to_string()),
            },
            sender.clone(),
        );
        assert_eq!(selector.select().unwrap().backend(), SignerBackend::Custodial);

        let selector = SignerSelector::new(
            SignerConfig {
                custodial: None,
                private_key: Some(EIP155_KEY.to_string()),
            },
            sender.clone(),
        );
        assert_eq!(selector.select().unwrap().backend(), SignerBackend::LocalKey);

        let selector = SignerSelector::new(SignerConfig::default(), sender);
        assert!(matches!(
            selector.select().err().unwrap(),
            AttestError::Configuration(_)
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SignerConfig {
            custodial: None,
            private_key: Some(EIP155_KEY.to_string()),
        };
        assert!(!format!("{:?}", config).contains("4646"));
    }
}
