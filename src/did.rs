/// Decentralized identifier parsing
///
/// Two methods are understood:
/// - `did:web:<domain>[:<path>...]`
/// - `did:pkh:<namespace>:<reference>:<address>`
use crate::{
    caip10::{self, ChainAccountId},
    error::{AttestError, AttestResult},
};
use std::fmt;
use std::str::FromStr;

/// A parsed DID, canonical once constructed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Did {
    Web {
        domain: String,
        path: Option<String>,
    },
    ChainAccount(ChainAccountId),
}

impl Did {
    /// Parse a DID string. Dispatch is purely on the method prefix.
    pub fn parse(did: &str) -> AttestResult<Self> {
        let rest = did
            .strip_prefix("did:")
            .ok_or_else(|| AttestError::Format(format!("'{}' is not a DID", did)))?;
        let (method, specific) = rest
            .split_once(':')
            .ok_or_else(|| AttestError::Format(format!("'{}' has no method-specific id", did)))?;

        match method {
            "web" => parse_web(did, specific),
            "pkh" => {
                let account = caip10::normalize(specific)?;
                Ok(Did::ChainAccount(account))
            }
            other => Err(AttestError::UnsupportedDidMethod(other.to_string())),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Did::Web { .. } => "web",
            Did::ChainAccount(_) => "pkh",
        }
    }
}

fn parse_web(did: &str, specific: &str) -> AttestResult<Did> {
    let mut segments = specific.split(':');
    // did:web encodes an explicit port as %3A
    let domain = segments
        .next()
        .unwrap_or_default()
        .replace("%3A", ":")
        .replace("%3a", ":")
        .to_lowercase();

    let host = domain.split(':').next().unwrap_or_default();
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(AttestError::Format(format!(
            "'{}' does not contain a valid domain",
            did
        )));
    }

    let path: Vec<&str> = segments.collect();
    if path.iter().any(|s| s.is_empty()) {
        return Err(AttestError::Format(format!("'{}' has an empty path segment", did)));
    }
    let path = if path.is_empty() {
        None
    } else {
        Some(path.join("/"))
    };

    Ok(Did::Web { domain, path })
}

impl FromStr for Did {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Did::parse(s)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Did::Web { domain, path } => {
                write!(f, "did:web:{}", domain.replace(':', "%3A"))?;
                if let Some(path) = path {
                    write!(f, ":{}", path.replace('/', ":"))?;
                }
                Ok(())
            }
            Did::ChainAccount(account) => write!(f, "did:pkh:{}", account),
        }
    }
}
