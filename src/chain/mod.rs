/// Chain access capabilities
///
/// The verification pipeline only needs a handful of read calls and one
/// write path. These traits keep the JSON-RPC client swappable so tests
/// can run against in-memory chains.
pub mod abi;
pub mod prober;
pub mod rpc;
pub mod transfer;

pub use prober::{OwnershipProber, Probe, PROBES};
pub use rpc::RpcClient;
pub use transfer::{expected_transfer_amount, TransferProofVerifier};

use crate::{attestation::signer::TransactionSigner, error::AttestResult};
use async_trait::async_trait;

/// A transaction as returned by `eth_getTransactionByHash`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: String,
    pub from: String,
    /// None for contract creation
    pub to: Option<String>,
    pub value: u128,
    pub block_number: Option<u64>,
}

/// The parts of a receipt the verifiers care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub block_number: u64,
    pub success: bool,
}

/// Read-only chain access
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against the latest block, returning raw return data
    async fn call(&self, chain_id: u64, to: &str, data: &[u8]) -> AttestResult<Vec<u8>>;

    /// `eth_getStorageAt` against the latest block
    async fn storage_at(&self, chain_id: u64, address: &str, slot: &[u8; 32])
        -> AttestResult<[u8; 32]>;

    /// Look up a transaction, None if the node does not know it
    async fn transaction(&self, chain_id: u64, hash: &str) -> AttestResult<Option<TransactionInfo>>;

    /// Look up a receipt, None while the transaction is pending
    async fn receipt(&self, chain_id: u64, hash: &str) -> AttestResult<Option<ReceiptInfo>>;

    /// Current head block number
    async fn block_number(&self, chain_id: u64) -> AttestResult<u64>;
}

/// An unsigned contract call to be written on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub value: u128,
}

/// A contract call with gas parameters filled in, ready for a signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub value: u128,
    pub gas_limit: u64,
    pub gas_price: u128,
}

/// Chain write capability: prepare, then send through a pluggable signer
#[async_trait]
pub trait ChainWriter: Send + Sync {
    async fn prepare(&self, call: ContractCall) -> AttestResult<PreparedTransaction>;

    /// Sign and broadcast, returning the transaction hash
    async fn send(
        &self,
        tx: &PreparedTransaction,
        signer: &dyn TransactionSigner,
    ) -> AttestResult<String>;
}

/// Raw transaction plumbing used by the local-key signer
#[async_trait]
pub trait RawTransactionSender: Send + Sync {
    /// Pending nonce for an account
    async fn nonce(&self, chain_id: u64, address: &str) -> AttestResult<u64>;

    /// `eth_sendRawTransaction`, returning the transaction hash
    async fn send_raw(&self, chain_id: u64, raw: &[u8]) -> AttestResult<String>;
}
