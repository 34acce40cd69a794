/// In-memory capability fakes shared by unit tests
use crate::{
    attestation::{signer::TransactionSigner, AttestationReader, AttestationStatus, SchemaId},
    chain::{
        abi, ChainReader, ChainWriter, ContractCall, PreparedTransaction, RawTransactionSender,
        ReceiptInfo, TransactionInfo,
    },
    did::Did,
    error::{AttestError, AttestResult},
    verifier::{dns::TxtResolver, document::DocumentFetcher},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// EIP-55 checksummed test accounts
pub const ALICE: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
pub const BOB: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const CONTRACT: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

fn key(address: &str) -> String {
    address.to_lowercase()
}

/// Chain with canned call results, storage, transactions and receipts
#[derive(Default)]
pub struct FakeChain {
    calls: HashMap<(String, [u8; 4]), Vec<u8>>,
    storage: HashMap<(String, [u8; 32]), [u8; 32]>,
    transactions: HashMap<String, TransactionInfo>,
    receipts: HashMap<String, ReceiptInfo>,
    head: u64,
    reads: AtomicUsize,
}

impl FakeChain {
    /// Make `signature` on `contract` return `address`
    pub fn with_call(mut self, contract: &str, signature: &str, address: &str) -> Self {
        let word = abi::address_word(address).expect("test address");
        self.calls
            .insert((key(contract), abi::selector(signature)), word.to_vec());
        self
    }

    /// Make `signature` on `contract` return raw data
    pub fn with_raw_call(mut self, contract: &str, signature: &str, data: Vec<u8>) -> Self {
        self.calls
            .insert((key(contract), abi::selector(signature)), data);
        self
    }

    pub fn with_storage(mut self, contract: &str, slot: &[u8; 32], address: &str) -> Self {
        let word = abi::address_word(address).expect("test address");
        self.storage.insert((key(contract), *slot), word);
        self
    }

    pub fn with_transaction(mut self, tx: TransactionInfo, receipt: Option<ReceiptInfo>) -> Self {
        if let Some(receipt) = receipt {
            self.receipts.insert(key(&tx.hash), receipt);
        }
        self.transactions.insert(key(&tx.hash), tx);
        self
    }

    pub fn with_head(mut self, head: u64) -> Self {
        self.head = head;
        self
    }

    /// Number of read calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn call(&self, _chain_id: u64, to: &str, data: &[u8]) -> AttestResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        self.calls
            .get(&(key(to), selector))
            .cloned()
            .ok_or_else(|| AttestError::Rpc("execution reverted".to_string()))
    }

    async fn storage_at(
        &self,
        _chain_id: u64,
        address: &str,
        slot: &[u8; 32],
    ) -> AttestResult<[u8; 32]> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .storage
            .get(&(key(address), *slot))
            .copied()
            .unwrap_or([0u8; 32]))
    }

    async fn transaction(
        &self,
        _chain_id: u64,
        hash: &str,
    ) -> AttestResult<Option<TransactionInfo>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.get(&key(hash)).cloned())
    }

    async fn receipt(&self, _chain_id: u64, hash: &str) -> AttestResult<Option<ReceiptInfo>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.receipts.get(&key(hash)).copied())
    }

    async fn block_number(&self, _chain_id: u64) -> AttestResult<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.head)
    }
}

/// TXT resolver serving fixed records per name
#[derive(Default)]
pub struct FakeTxt {
    records: HashMap<String, Vec<String>>,
}

impl FakeTxt {
    pub fn with_records(mut self, name: &str, records: &[&str]) -> Self {
        self.records.insert(
            name.to_string(),
            records.iter().map(|r| r.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl TxtResolver for FakeTxt {
    async fn lookup_txt(&self, name: &str) -> AttestResult<Vec<String>> {
        self.records
            .get(name)
            .cloned()
            .ok_or_else(|| AttestError::NotFound(format!("no TXT records at {}", name)))
    }
}

/// Document fetcher serving fixed did.json bodies per domain
#[derive(Default)]
pub struct FakeDocuments {
    documents: HashMap<String, Value>,
}

impl FakeDocuments {
    pub fn with_document(mut self, domain: &str, doc: Value) -> Self {
        self.documents.insert(domain.to_string(), doc);
        self
    }
}

#[async_trait]
impl DocumentFetcher for FakeDocuments {
    async fn fetch_did_document(&self, domain: &str) -> AttestResult<Value> {
        self.documents
            .get(domain)
            .cloned()
            .ok_or_else(|| AttestError::NotFound(format!("did.json at {} returned HTTP 404", domain)))
    }
}

/// Raw transaction sink recording everything broadcast
#[derive(Default)]
pub struct FakeRawSender {
    nonce: u64,
    nonce_reads: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl FakeRawSender {
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn nonce_reads(&self) -> usize {
        self.nonce_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawTransactionSender for FakeRawSender {
    async fn nonce(&self, _chain_id: u64, _address: &str) -> AttestResult<u64> {
        self.nonce_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce)
    }

    async fn send_raw(&self, _chain_id: u64, raw: &[u8]) -> AttestResult<String> {
        self.sent.lock().unwrap().push(raw.to_vec());
        Ok(abi::to_hex(&abi::keccak256(raw)))
    }
}

/// Registry view with a fixed set of present schemas
#[derive(Default)]
pub struct FakeAttestations {
    present: HashSet<String>,
    reads: AtomicUsize,
}

impl FakeAttestations {
    pub fn with_present(mut self, schema: &str) -> Self {
        self.present.insert(schema.to_string());
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationReader for FakeAttestations {
    async fn coverage(
        &self,
        _did: &Did,
        _subject: &str,
        schemas: &[SchemaId],
    ) -> AttestResult<AttestationStatus> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let (present, missing): (BTreeSet<SchemaId>, BTreeSet<SchemaId>) = schemas
            .iter()
            .cloned()
            .partition(|s| self.present.contains(s.as_str()));
        Ok(AttestationStatus { present, missing })
    }
}

/// Chain writer counting sends and failing for chosen schemas
#[derive(Default)]
pub struct FakeWriter {
    failing: HashSet<[u8; 32]>,
    sends: AtomicUsize,
}

impl FakeWriter {
    /// Make every write for `schema` fail
    pub fn failing_for(mut self, schema: &SchemaId) -> Self {
        self.failing.insert(schema.uid());
        self
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainWriter for FakeWriter {
    async fn prepare(&self, call: ContractCall) -> AttestResult<PreparedTransaction> {
        Ok(PreparedTransaction {
            chain_id: call.chain_id,
            from: call.from,
            to: call.to,
            data: call.data,
            value: call.value,
            gas_limit: 100_000,
            gas_price: 1,
        })
    }

    async fn send(
        &self,
        tx: &PreparedTransaction,
        _signer: &dyn TransactionSigner,
    ) -> AttestResult<String> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let mut schema = [0u8; 32];
        schema.copy_from_slice(&tx.data[4..36]);
        if self.failing.contains(&schema) {
            return Err(AttestError::Rpc("execution reverted: already attested".to_string()));
        }
        Ok(abi::to_hex(&abi::keccak256(&tx.data)))
    }
}
