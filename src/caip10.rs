/// CAIP-10 chain-account identifier normalization
///
/// Parses `namespace:reference:address` identifiers for the three supported
/// address families and produces their canonical form:
/// - `eip155`: decimal chain id, EIP-55 checksummed address
/// - `solana`: lowercase network name, base58 address passed through
/// - `sui`: lowercase network name, address zero-padded to 64 hex chars
///
/// Everything here is pure; no I/O.
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Namespaces accepted by [`normalize`]
pub const SUPPORTED_NAMESPACES: [&str; 3] = ["eip155", "solana", "sui"];

const SOLANA_NETWORKS: [&str; 3] = ["mainnet", "devnet", "testnet"];
const SUI_NETWORKS: [&str; 3] = ["mainnet", "testnet", "devnet"];

const EVM_ADDRESS_HEX_LEN: usize = 40;
const SUI_ADDRESS_HEX_LEN: usize = 64;

/// Normalization failures, one per validation stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("identifier '{0}' must have the form namespace:reference:address")]
    InvalidFormat(String),

    #[error("unsupported namespace '{0}': supported namespaces are eip155, solana, sui")]
    UnsupportedNamespace(String),

    #[error("chain id '{0}' must be a non-negative base-10 integer")]
    InvalidChainId(String),

    #[error("address '{0}' must start with 0x")]
    MissingPrefix(String),

    #[error("address has {actual} hex characters, expected {expected}")]
    WrongByteLength { expected: usize, actual: usize },

    #[error("address '{0}' contains non-hex characters")]
    NonHexChars(String),

    #[error("failed to compute checksum for '{0}'")]
    ChecksumFailed(String),

    #[error("unknown {namespace} network '{reference}'")]
    InvalidNetwork { namespace: String, reference: String },

    #[error("address '{0}' is not valid base58")]
    InvalidBase58(String),
}

/// Supported address families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Eip155,
    Solana,
    Sui,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Eip155 => "eip155",
            Namespace::Solana => "solana",
            Namespace::Sui => "sui",
        }
    }
}

impl FromStr for Namespace {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eip155" => Ok(Namespace::Eip155),
            "solana" => Ok(Namespace::Solana),
            "sui" => Ok(Namespace::Sui),
            other => Err(NormalizeError::UnsupportedNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, canonical chain-account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChainAccountId {
    namespace: Namespace,
    reference: String,
    address: String,
}

impl ChainAccountId {
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Numeric chain id for eip155 identifiers
    pub fn chain_id(&self) -> Option<u64> {
        match self.namespace {
            Namespace::Eip155 => self.reference.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ChainAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.reference, self.address)
    }
}

impl FromStr for ChainAccountId {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Parse and canonicalize a `namespace:reference:address` identifier
pub fn normalize(id: &str) -> Result<ChainAccountId, NormalizeError> {
    let parts: Vec<&str> = id.split(':').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(NormalizeError::InvalidFormat(id.to_string()));
    }

    let namespace: Namespace = parts[0].parse()?;
    let (reference, address) = match namespace {
        Namespace::Eip155 => (normalize_chain_id(parts[1])?, to_checksum_address(parts[2])?),
        Namespace::Solana => (
            normalize_network(namespace, parts[1], &SOLANA_NETWORKS)?,
            validate_base58(parts[2])?,
        ),
        Namespace::Sui => (
            normalize_network(namespace, parts[1], &SUI_NETWORKS)?,
            pad_sui_address(parts[2])?,
        ),
    };

    Ok(ChainAccountId {
        namespace,
        reference,
        address,
    })
}

/// Canonical string form of an identifier
pub fn normalize_str(id: &str) -> Result<String, NormalizeError> {
    normalize(id).map(|id| id.to_string())
}

fn normalize_chain_id(reference: &str) -> Result<String, NormalizeError> {
    if !reference.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidChainId(reference.to_string()));
    }
    reference
        .parse::<u64>()
        .map(|id| id.to_string())
        .map_err(|_| NormalizeError::InvalidChainId(reference.to_string()))
}

fn normalize_network(
    namespace: Namespace,
    reference: &str,
    allowed: &[&str],
) -> Result<String, NormalizeError> {
    let lowered = reference.to_ascii_lowercase();
    if allowed.contains(&lowered.as_str()) {
        Ok(lowered)
    } else {
        Err(NormalizeError::InvalidNetwork {
            namespace: namespace.to_string(),
            reference: reference.to_string(),
        })
    }
}

fn validate_base58(address: &str) -> Result<String, NormalizeError> {
    bs58::decode(address)
        .into_vec()
        .map_err(|_| NormalizeError::InvalidBase58(address.to_string()))?;
    Ok(address.to_string())
}

fn pad_sui_address(address: &str) -> Result<String, NormalizeError> {
    let body = address
        .strip_prefix("0x")
        .ok_or_else(|| NormalizeError::MissingPrefix(address.to_string()))?;
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NormalizeError::NonHexChars(address.to_string()));
    }
    if body.is_empty() || body.len() > SUI_ADDRESS_HEX_LEN {
        return Err(NormalizeError::WrongByteLength {
            expected: SUI_ADDRESS_HEX_LEN,
            actual: body.len(),
        });
    }
    Ok(format!("0x{:0>width$}", body, width = SUI_ADDRESS_HEX_LEN))
}

/// Validate the shape of a `0x`-prefixed 20-byte hex address
pub fn validate_evm_address(address: &str) -> Result<&str, NormalizeError> {
    let body = address
        .strip_prefix("0x")
        .ok_or_else(|| NormalizeError::MissingPrefix(address.to_string()))?;
    if body.len() != EVM_ADDRESS_HEX_LEN {
        return Err(NormalizeError::WrongByteLength {
            expected: EVM_ADDRESS_HEX_LEN,
            actual: body.len(),
        });
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NormalizeError::NonHexChars(address.to_string()));
    }
    Ok(body)
}

/// EIP-55 mixed-case checksum encoding
pub fn to_checksum_address(address: &str) -> Result<String, NormalizeError> {
    let body = validate_evm_address(address)?.to_ascii_lowercase();
    let hash = Keccak256::digest(body.as_bytes());

    // Only reachable if validation and encoding disagree
    if hex::decode(&body).is_err() {
        return Err(NormalizeError::ChecksumFailed(address.to_string()));
    }

    let mut out = String::with_capacity(2 + EVM_ADDRESS_HEX_LEN);
    out.push_str("0x");
    for (i, c) in body.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Case-insensitive comparison of hex addresses
pub fn addresses_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// True for `0x000...0` in any length
pub fn is_zero_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map(|body| body.bytes().all(|b| b == b'0'))
        .unwrap_or(false)
}
