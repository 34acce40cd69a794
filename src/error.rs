/// Unified error types for did-attest
use crate::caip10::NormalizeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for verification and attestation
#[derive(Error, Debug)]
pub enum AttestError {
    /// Chain-account identifier failed normalization
    #[error("Invalid identifier: {0}")]
    Identifier(#[from] NormalizeError),

    /// Malformed DID, address or request field
    #[error("Invalid format: {0}")]
    Format(String),

    /// DID method other than web or pkh
    #[error("Unsupported DID method: {0}")]
    UnsupportedDidMethod(String),

    /// Missing TXT record, document, transaction, etc.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No controlling account could be discovered for a contract
    #[error("Controlling wallet not found for contract {0}")]
    ControllingWalletNotFound(String),

    /// Transaction exists but has not reached the required confirmations
    #[error("Transaction not confirmed: {0}")]
    Unconfirmed(String),

    /// Address, amount, sender or recipient mismatch
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// Both web verification attempts failed
    #[error("DNS verification failed: {dns}; document verification failed: {document}")]
    WebVerification {
        dns: Box<AttestError>,
        document: Box<AttestError>,
    },

    /// DNS or RPC transport failure after retries
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// JSON-RPC error object returned by the node (reverts, bad params)
    #[error("Chain RPC error: {0}")]
    Rpc(String),

    /// Missing signer or client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Format,
    NotFound,
    Mismatch,
    TransientNetwork,
    Configuration,
    Internal,
}

impl AttestError {
    /// Classify into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttestError::Identifier(_)
            | AttestError::Format(_)
            | AttestError::UnsupportedDidMethod(_) => ErrorKind::Format,
            AttestError::NotFound(_)
            | AttestError::ControllingWalletNotFound(_)
            | AttestError::Unconfirmed(_) => ErrorKind::NotFound,
            AttestError::Mismatch { .. } => ErrorKind::Mismatch,
            AttestError::WebVerification { dns, document } => {
                if dns.kind() == ErrorKind::Mismatch || document.kind() == ErrorKind::Mismatch {
                    ErrorKind::Mismatch
                } else {
                    dns.kind()
                }
            }
            AttestError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            AttestError::Rpc(_) => ErrorKind::NotFound,
            AttestError::Configuration(_) => ErrorKind::Configuration,
            AttestError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failing call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttestError::TransientNetwork(_))
    }

    pub fn mismatch(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        AttestError::Mismatch {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert AttestError to HTTP response
impl IntoResponse for AttestError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self.kind() {
            ErrorKind::Format => (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ErrorKind::Mismatch => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VerificationFailed",
                self.to_string(),
            ),
            ErrorKind::TransientNetwork => {
                (StatusCode::BAD_GATEWAY, "UpstreamUnavailable", self.to_string())
            }
            ErrorKind::Configuration | ErrorKind::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for did-attest operations
pub type AttestResult<T> = Result<T, AttestError>;
