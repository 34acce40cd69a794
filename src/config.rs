/// Configuration management for did-attest
use crate::{
    attestation::signer::{CustodialConfig, SignerConfig},
    caip10,
    error::{AttestError, AttestResult},
};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub chain: ChainConfig,
    pub signer: SignerConfig,
    pub verification: VerificationConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Include verbose diagnostics in API responses
    pub debug_responses: bool,
    pub request_timeout: Duration,
}

/// Chain access configuration
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Chain the attestation registry lives on
    pub active_chain_id: u64,
    /// JSON-RPC endpoint per chain id
    pub rpc_urls: HashMap<u64, String>,
    pub registry_address: String,
    pub rpc_max_retries: u32,
}

/// Verification configuration
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// DNS-over-HTTPS JSON endpoint
    pub doh_url: String,
    pub document_timeout: Duration,
    /// Blocks a proof transfer needs; 0 means inclusion is enough
    pub min_confirmations: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives for the subscriber
    pub level: String,
}

/// Filter directives used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "did_attest=debug,tower_http=debug";

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> AttestResult<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AttestError::Configuration(format!("Invalid value for {}: {}", name, value))),
        Err(_) => Ok(default),
    }
}

/// Parse `chainId=url,chainId=url`
pub fn parse_rpc_urls(value: &str) -> AttestResult<HashMap<u64, String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (chain, url) = entry.split_once('=').ok_or_else(|| {
                AttestError::Configuration(format!("RPC entry '{}' is not chainId=url", entry))
            })?;
            let chain_id = chain.trim().parse().map_err(|_| {
                AttestError::Configuration(format!("Invalid chain id in RPC entry '{}'", entry))
            })?;
            Ok((chain_id, url.trim().to_string()))
        })
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AttestResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ATTEST_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_or("ATTEST_PORT", 3000u16)?;
        let debug_responses = env_or("ATTEST_DEBUG_RESPONSES", false)?;
        let request_timeout = Duration::from_secs(env_or("ATTEST_REQUEST_TIMEOUT_SECS", 60u64)?);

        let active_chain_id = env::var("ATTEST_ACTIVE_CHAIN_ID")
            .map_err(|_| AttestError::Configuration("ATTEST_ACTIVE_CHAIN_ID required".to_string()))?
            .trim()
            .parse::<u64>()
            .map_err(|_| AttestError::Configuration("Invalid ATTEST_ACTIVE_CHAIN_ID".to_string()))?;
        let rpc_urls = parse_rpc_urls(&env::var("ATTEST_RPC_URLS").unwrap_or_default())?;
        let registry_address = env::var("ATTEST_REGISTRY_ADDRESS")
            .map_err(|_| AttestError::Configuration("ATTEST_REGISTRY_ADDRESS required".to_string()))?;
        let rpc_max_retries = env_or("ATTEST_RPC_MAX_RETRIES", 3u32)?;

        let custodial = match env::var("ATTEST_CUSTODIAL_API_URL") {
            Ok(api_url) => Some(CustodialConfig {
                api_url,
                api_key: env::var("ATTEST_CUSTODIAL_API_KEY").map_err(|_| {
                    AttestError::Configuration("Custodial API key required".to_string())
                })?,
                wallet_address: env::var("ATTEST_CUSTODIAL_WALLET").map_err(|_| {
                    AttestError::Configuration("Custodial wallet address required".to_string())
                })?,
            }),
            Err(_) => None,
        };
        let private_key = env::var("ATTEST_SIGNER_PRIVATE_KEY").ok();

        let doh_url = env::var("ATTEST_DOH_URL")
            .unwrap_or_else(|_| "https://cloudflare-dns.com/dns-query".to_string());
        let document_timeout = Duration::from_secs(env_or("ATTEST_DOCUMENT_TIMEOUT_SECS", 10u64)?);
        let min_confirmations = env_or("ATTEST_MIN_CONFIRMATIONS", 0u64)?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        let config = ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                debug_responses,
                request_timeout,
            },
            chain: ChainConfig {
                active_chain_id,
                rpc_urls,
                registry_address,
                rpc_max_retries,
            },
            signer: SignerConfig {
                custodial,
                private_key,
            },
            verification: VerificationConfig {
                doh_url,
                document_timeout,
                min_confirmations,
            },
            logging: LoggingConfig { level: log_level },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> AttestResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AttestError::Configuration("Hostname cannot be empty".to_string()));
        }

        if !self.chain.rpc_urls.contains_key(&self.chain.active_chain_id) {
            return Err(AttestError::Configuration(format!(
                "No RPC URL configured for active chain {}",
                self.chain.active_chain_id
            )));
        }

        caip10::validate_evm_address(&self.chain.registry_address).map_err(|e| {
            AttestError::Configuration(format!("Invalid registry address: {}", e))
        })?;

        if let Some(custodial) = &self.signer.custodial {
            caip10::validate_evm_address(&custodial.wallet_address).map_err(|e| {
                AttestError::Configuration(format!("Invalid custodial wallet address: {}", e))
            })?;
        }

        // A missing signer is only fatal once a write is needed
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 3000,
                debug_responses: false,
                request_timeout: Duration::from_secs(60),
            },
            chain: ChainConfig {
                active_chain_id: 66238,
                rpc_urls: parse_rpc_urls("66238=https://rpc.testnet.example").unwrap(),
                registry_address: "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".to_string(),
                rpc_max_retries: 3,
            },
            signer: SignerConfig::default(),
            verification: VerificationConfig {
                doh_url: "https://cloudflare-dns.com/dns-query".to_string(),
                document_timeout: Duration::from_secs(10),
                min_confirmations: 0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_parse_rpc_urls() {
        let urls = parse_rpc_urls(" 1=https://eth.example , 66238=https://omachain.example,").unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[&1], "https://eth.example");
        assert_eq!(urls[&66238], "https://omachain.example");

        assert!(parse_rpc_urls("mainnet=https://eth.example").is_err());
        assert!(parse_rpc_urls("https://eth.example").is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_active_chain_needs_rpc_url() {
        let mut config = config();
        config.chain.active_chain_id = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_registry_address_validated() {
        let mut config = config();
        config.chain.registry_address = "registry".to_string();
        assert!(matches!(
            config.validate(),
            Err(AttestError::Configuration(_))
        ));
    }

    #[test]
    fn test_default_log_filter_parses() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
