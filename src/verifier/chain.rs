/// did:pkh verification against on-chain ownership
use super::{VerificationMethod, VerificationOutcome};
use crate::{
    caip10::{self, ChainAccountId, Namespace},
    chain::{ChainReader, OwnershipProber, TransferProofVerifier},
    did::Did,
    error::AttestError,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ChainAccountVerifier {
    prober: OwnershipProber,
    transfer: TransferProofVerifier,
}

impl ChainAccountVerifier {
    pub fn new(reader: Arc<dyn ChainReader>, min_confirmations: u64) -> Self {
        Self {
            prober: OwnershipProber::new(reader.clone()),
            transfer: TransferProofVerifier::new(reader, min_confirmations),
        }
    }

    /// Verify that `claimant` controls the contract named by `account`.
    ///
    /// With `tx_ref` the discovered controller must have sent the proof
    /// transfer to `claimant`; without it `claimant` must be one of the
    /// probed controllers.
    pub async fn verify(
        &self,
        did: &Did,
        account: &ChainAccountId,
        claimant: &str,
        tx_ref: Option<&str>,
    ) -> VerificationOutcome {
        let chain_id = match (account.namespace(), account.chain_id()) {
            (Namespace::Eip155, Some(chain_id)) => chain_id,
            _ => {
                let error = AttestError::Format(format!(
                    "Only eip155 accounts can be probed, got {}",
                    account.namespace()
                ));
                return VerificationOutcome::failed(&error, None);
            }
        };
        let contract = account.address();

        if let Some(tx_ref) = tx_ref {
            return match self.prober.discover_controller(chain_id, contract).await {
                Ok(Some(controller)) => {
                    self.transfer
                        .verify_transfer(did, &controller, claimant, chain_id, tx_ref)
                        .await
                }
                Err(e) => VerificationOutcome::failed(&e, None),
                Ok(None) => VerificationOutcome::failed(
                    &AttestError::ControllingWalletNotFound(contract.to_string()),
                    Some(json!({ "contract": contract, "chainId": chain_id })),
                ),
            };
        }

        let scan = match self.prober.scan_for(chain_id, contract, claimant).await {
            Ok(scan) => scan,
            Err(e) => return VerificationOutcome::failed(&e, None),
        };

        if let Some(hit) = scan.matched {
            return VerificationOutcome::verified(
                VerificationMethod::Contract,
                Some(json!({ "probe": hit.probe.to_string(), "controller": hit.address })),
            );
        }

        // Minting wallet: the claimant is the contract itself. Relaxed
        // self-attestation, pending security review.
        if let Some(controller) = &scan.first_controller {
            if caip10::addresses_equal(claimant, contract) {
                warn!(%did, %claimant, controller = %controller.address, "accepting minting-wallet self-attestation");
                return VerificationOutcome::verified(
                    VerificationMethod::MintingWallet,
                    Some(json!({ "controller": controller.address })),
                );
            }
        }

        match scan.first_controller {
            Some(hit) => VerificationOutcome::failed(
                &AttestError::mismatch("Controlling wallet", hit.address.clone(), claimant),
                Some(json!({ "contract": contract, "controller": hit.address })),
            ),
            None => VerificationOutcome::failed(
                &AttestError::NotFound(format!(
                    "controlling wallet not found for {}; claimant {}",
                    contract, claimant
                )),
                Some(json!({ "contract": contract, "chainId": chain_id })),
            ),
        }
    }
}
