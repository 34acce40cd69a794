/// did-attest: DID ownership verification and on-chain attestation
///
/// Verifies that a connected wallet controls a `did:web` domain or a
/// `did:pkh` contract account, then writes the missing attestations for it
/// to an on-chain registry.
pub mod api;
pub mod attestation;
pub mod caip10;
pub mod chain;
pub mod config;
pub mod context;
pub mod did;
pub mod error;
pub mod metrics;
pub mod server;
pub mod verifier;

#[cfg(test)]
mod test_support;

pub use context::AppContext;
pub use error::{AttestError, AttestResult};
