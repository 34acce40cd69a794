/// Application context and dependency injection
use crate::{
    attestation::{
        AttestationConfig, AttestationOrchestrator, RegistryAttestationReader, SignerSelector,
    },
    chain::{rpc::RpcClientConfig, RpcClient},
    config::ServerConfig,
    error::AttestResult,
    verifier::{DidVerifier, DohResolver, HttpDocumentFetcher},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub orchestrator: Arc<AttestationOrchestrator>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> AttestResult<Self> {
        config.validate()?;

        let rpc = Arc::new(RpcClient::new(RpcClientConfig {
            endpoints: config.chain.rpc_urls.clone(),
            max_retries: config.chain.rpc_max_retries,
            ..RpcClientConfig::default()
        })?);

        let resolver = Arc::new(DohResolver::new(
            config.verification.doh_url.clone(),
            DNS_TIMEOUT,
            config.chain.rpc_max_retries,
        )?);
        let fetcher = Arc::new(HttpDocumentFetcher::new(config.verification.document_timeout)?);

        let verifier = DidVerifier::new(
            resolver,
            fetcher,
            rpc.clone(),
            config.verification.min_confirmations,
        );

        let attestations = Arc::new(RegistryAttestationReader::new(
            rpc.clone(),
            config.chain.active_chain_id,
            config.chain.registry_address.clone(),
        ));
        let signers = SignerSelector::new(config.signer.clone(), rpc.clone());
        if !signers.is_configured() {
            info!("No signer configured; requests needing writes will fail");
        }

        let orchestrator = Arc::new(AttestationOrchestrator::new(
            AttestationConfig {
                active_chain_id: config.chain.active_chain_id,
                registry_address: config.chain.registry_address.clone(),
            },
            verifier,
            attestations,
            rpc,
            signers,
        ));

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
