/// Minimal ABI and hex helpers for static-argument contract calls
use crate::{
    caip10,
    error::{AttestError, AttestResult},
};
use sha3::{Digest, Keccak256};

pub type Word = [u8; 32];

pub fn keccak256(data: &[u8]) -> Word {
    Keccak256::digest(data).into()
}

/// First four bytes of the keccak hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call whose arguments are all static 32-byte words
pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

/// Left-pad a 20-byte address into an ABI word
pub fn address_word(address: &str) -> AttestResult<Word> {
    let body = caip10::validate_evm_address(address)?;
    let bytes = hex::decode(body).map_err(|e| AttestError::Format(e.to_string()))?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

/// Low 20 bytes of the first word, as a checksummed address
pub fn decode_address(data: &[u8]) -> Option<String> {
    if data.len() < 32 {
        return None;
    }
    let hex_addr = format!("0x{}", hex::encode(&data[12..32]));
    caip10::to_checksum_address(&hex_addr).ok()
}

pub fn decode_bool(data: &[u8]) -> AttestResult<bool> {
    if data.len() < 32 {
        return Err(AttestError::Rpc(format!(
            "expected a 32-byte bool, got {} bytes",
            data.len()
        )));
    }
    Ok(data[..32].iter().any(|b| *b != 0))
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(value: &str) -> AttestResult<Vec<u8>> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    // Nodes may return odd-length quantities
    let padded = if body.len() % 2 == 1 {
        format!("0{}", body)
    } else {
        body.to_string()
    };
    hex::decode(padded).map_err(|e| AttestError::Rpc(format!("invalid hex '{}': {}", value, e)))
}

/// Parse a JSON-RPC hex quantity (`0x1a`)
pub fn parse_quantity(value: &str) -> AttestResult<u128> {
    let body = value
        .strip_prefix("0x")
        .ok_or_else(|| AttestError::Rpc(format!("quantity '{}' is missing 0x", value)))?;
    if body.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(body, 16)
        .map_err(|e| AttestError::Rpc(format!("invalid quantity '{}': {}", value, e)))
}

pub fn format_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Validate a `0x`-prefixed 32-byte transaction hash
pub fn validate_tx_hash(hash: &str) -> AttestResult<()> {
    let valid = hash
        .strip_prefix("0x")
        .map(|body| body.len() == 64 && body.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(AttestError::Format(format!(
            "'{}' is not a 32-byte transaction hash",
            hash
        )))
    }
}
