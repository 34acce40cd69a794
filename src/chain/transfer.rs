/// Transfer-proof verification
///
/// A controller proves control of a DID by sending a deterministic,
/// hash-derived micro-amount to the claimant. The amount depends only on
/// (subject DID, counterparty account, chain id, purpose), so it acts as an
/// unguessable challenge that cannot be replayed for another subject.
///
/// Inclusion is the proof: any receipt is enough unless `min_confirmations`
/// is raised. Transaction age is not checked.
use super::{abi, ChainReader};
use crate::{
    caip10,
    did::Did,
    error::{AttestError, AttestResult},
    verifier::{VerificationMethod, VerificationOutcome},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Purpose tag for proofs of shared control
pub const SHARED_CONTROL_PURPOSE: &str = "shared-control";

/// 0.000001 of an 18-decimal native token
const BASE_AMOUNT_WEI: u128 = 1_000_000_000_000;
const AMOUNT_SPREAD_WEI: u64 = 1_000_000_000_000;

/// CAIP-10 id of the account receiving the proof transfer
pub fn counterparty_account_id(chain_id: u64, claimant: &str) -> String {
    format!("eip155:{}:{}", chain_id, claimant.to_lowercase())
}

/// Deterministic proof amount in wei, in `[BASE, BASE + SPREAD)`
pub fn expected_transfer_amount(
    subject_did: &str,
    counterparty: &str,
    chain_id: u64,
    purpose: &str,
) -> u128 {
    let seed = format!("{}|{}|{}|{}", purpose, subject_did, counterparty, chain_id);
    let hash = abi::keccak256(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    BASE_AMOUNT_WEI + u128::from(u64::from_be_bytes(prefix) % AMOUNT_SPREAD_WEI)
}

/// Verifies proof-of-control transfers
#[derive(Clone)]
pub struct TransferProofVerifier {
    reader: Arc<dyn ChainReader>,
    min_confirmations: u64,
}

impl TransferProofVerifier {
    pub fn new(reader: Arc<dyn ChainReader>, min_confirmations: u64) -> Self {
        Self {
            reader,
            min_confirmations,
        }
    }

    /// Check that `tx_ref` moved the expected amount from `controller` to `claimant`
    pub async fn verify_transfer(
        &self,
        did: &Did,
        controller: &str,
        claimant: &str,
        chain_id: u64,
        tx_ref: &str,
    ) -> VerificationOutcome {
        match self
            .check_transfer(did, controller, claimant, chain_id, tx_ref)
            .await
        {
            Ok(details) => {
                info!(%did, %tx_ref, "transfer proof verified");
                VerificationOutcome::verified(VerificationMethod::Transfer, Some(details))
            }
            Err(e) => {
                debug!(%did, %tx_ref, error = %e, "transfer proof rejected");
                VerificationOutcome::failed(
                    &e,
                    Some(json!({
                        "txHash": tx_ref,
                        "controller": controller,
                        "claimant": claimant,
                    })),
                )
            }
        }
    }

    async fn check_transfer(
        &self,
        did: &Did,
        controller: &str,
        claimant: &str,
        chain_id: u64,
        tx_ref: &str,
    ) -> AttestResult<Value> {
        abi::validate_tx_hash(tx_ref)?;

        let tx = self
            .reader
            .transaction(chain_id, tx_ref)
            .await?
            .ok_or_else(|| {
                AttestError::NotFound(format!("Transaction {} not found on chain {}", tx_ref, chain_id))
            })?;

        let receipt = self
            .reader
            .receipt(chain_id, tx_ref)
            .await?
            .ok_or_else(|| AttestError::Unconfirmed(format!("{} has no receipt yet", tx_ref)))?;

        if !receipt.success {
            return Err(AttestError::mismatch("Transaction status", "success", "reverted"));
        }

        if self.min_confirmations > 0 {
            let head = self.reader.block_number(chain_id).await?;
            let confirmations = head.saturating_sub(receipt.block_number) + 1;
            if confirmations < self.min_confirmations {
                return Err(AttestError::Unconfirmed(format!(
                    "{} has {} of {} required confirmations",
                    tx_ref, confirmations, self.min_confirmations
                )));
            }
        }

        if !caip10::addresses_equal(&tx.from, controller) {
            return Err(AttestError::mismatch("Sender", controller, &tx.from));
        }

        let recipient = tx.to.as_deref().unwrap_or("contract creation");
        if !caip10::addresses_equal(recipient, claimant) {
            return Err(AttestError::mismatch("Recipient", claimant, recipient));
        }

        let counterparty = counterparty_account_id(chain_id, claimant);
        let expected = expected_transfer_amount(
            &did.to_string(),
            &counterparty,
            chain_id,
            SHARED_CONTROL_PURPOSE,
        );
        if tx.value != expected {
            return Err(AttestError::mismatch(
                "Transfer amount",
                format!("{} wei", expected),
                format!("{} wei", tx.value),
            ));
        }

        Ok(json!({
            "txHash": tx_ref,
            "blockNumber": receipt.block_number,
            "amountWei": expected.to_string(),
        }))
    }
}
