/// Ownership probing for contracts
///
/// Discovers the account that controls a contract by trying, in order,
/// `owner()`, `admin()` and `getOwner()`, then the EIP-1967 proxy admin
/// slot. A probe that reverts, errors or yields the zero address counts as
/// "try next". Only configuration errors propagate, since no probe can
/// succeed without an endpoint for the chain.
use super::{abi, ChainReader};
use crate::{
    caip10,
    error::{AttestError, AttestResult},
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// `bytes32(uint256(keccak256("eip1967.proxy.admin")) - 1)`
pub const EIP1967_ADMIN_SLOT: [u8; 32] = [
    0xb5, 0x31, 0x27, 0x68, 0x4a, 0x56, 0x8b, 0x31, 0x73, 0xae, 0x13, 0xb9, 0xf8, 0xa6, 0x01, 0x6e,
    0x24, 0x3e, 0x63, 0xb6, 0xe8, 0xee, 0x11, 0x78, 0xd6, 0xa7, 0x17, 0x85, 0x0b, 0x5d, 0x61, 0x03,
];

/// One way of asking a contract who controls it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Zero-argument view function returning an address
    Call(&'static str),
    /// Storage slot whose low 20 bytes hold an address
    StorageSlot(&'static [u8; 32]),
}

/// Probe order; first non-zero answer wins
pub const PROBES: [Probe; 4] = [
    Probe::Call("owner()"),
    Probe::Call("admin()"),
    Probe::Call("getOwner()"),
    Probe::StorageSlot(&EIP1967_ADMIN_SLOT),
];

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Call(signature) => f.write_str(signature),
            Probe::StorageSlot(_) => f.write_str("eip1967-admin-slot"),
        }
    }
}

/// An address reported by a specific probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHit {
    pub probe: Probe,
    pub address: String,
}

/// Result of walking the probe list looking for a particular account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeScan {
    /// First hit accepted by the predicate
    pub matched: Option<ProbeHit>,
    /// First non-zero controller seen, accepted or not
    pub first_controller: Option<ProbeHit>,
}

/// Contract ownership prober
#[derive(Clone)]
pub struct OwnershipProber {
    reader: Arc<dyn ChainReader>,
}

impl OwnershipProber {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Discover the controlling account of a contract, if any probe finds one
    pub async fn discover_controller(
        &self,
        chain_id: u64,
        contract: &str,
    ) -> AttestResult<Option<String>> {
        let scan = self.scan(chain_id, contract, |_| true).await?;
        Ok(scan.matched.map(|hit| hit.address))
    }

    /// Walk the probe list, stopping at the first controller equal to `claimant`
    pub async fn scan_for(
        &self,
        chain_id: u64,
        contract: &str,
        claimant: &str,
    ) -> AttestResult<ProbeScan> {
        self.scan(chain_id, contract, |candidate| {
            caip10::addresses_equal(candidate, claimant)
        })
        .await
    }

    async fn scan<F>(&self, chain_id: u64, contract: &str, accept: F) -> AttestResult<ProbeScan>
    where
        F: Fn(&str) -> bool,
    {
        let mut scan = ProbeScan::default();

        for probe in PROBES {
            let Some(address) = self.run_probe(probe, chain_id, contract).await? else {
                continue;
            };
            let hit = ProbeHit { probe, address };

            if scan.first_controller.is_none() {
                scan.first_controller = Some(hit.clone());
            }
            if accept(&hit.address) {
                debug!(%contract, %probe, address = %hit.address, "probe matched");
                scan.matched = Some(hit);
                return Ok(scan);
            }
        }

        Ok(scan)
    }

    /// Run one probe; None for a contract-level failure or a zero address
    async fn run_probe(
        &self,
        probe: Probe,
        chain_id: u64,
        contract: &str,
    ) -> AttestResult<Option<String>> {
        let result = match probe {
            Probe::Call(signature) => {
                let data = abi::encode_call(signature, &[]);
                self.reader
                    .call(chain_id, contract, &data)
                    .await
                    .map(|ret| abi::decode_address(&ret))
            }
            Probe::StorageSlot(slot) => self
                .reader
                .storage_at(chain_id, contract, slot)
                .await
                .map(|word| abi::decode_address(&word)),
        };

        match result {
            Ok(Some(address)) if !caip10::is_zero_address(&address) => Ok(Some(address)),
            Ok(_) => {
                debug!(%contract, %probe, "probe returned no address");
                Ok(None)
            }
            Err(e @ AttestError::Configuration(_)) => Err(e),
            Err(e) => {
                debug!(%contract, %probe, error = %e, "probe failed");
                Ok(None)
            }
        }
    }
}
