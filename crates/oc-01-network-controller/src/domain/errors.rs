//! # Domain Errors
//!
//! Error types for the network controller.
//!
//! ## Taxonomy
//!
//! | Result code | Meaning | Retry |
//! |-------------|---------|-------|
//! | `NotFound` | Network (or member) unknown | No, until created |
//! | `AccessDenied` | Unauthorized member | No, until authorized |
//! | `RateLimited` | Request storm from one node | After the interval |
//! | `TemporarilyUnavailable` | Store unreachable | With backoff |
//! | `InternalError` | Corrupt record / invariant broken | No |

use super::value_objects::{NetworkId, NodeAddress};
use thiserror::Error;

/// Errors produced by the decision engine and the admin service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// The network does not exist or is not owned by this controller.
    #[error("Network not found: {0}")]
    NetworkNotFound(NetworkId),

    /// The member does not exist (admin lookups only).
    #[error("Member {member} not found on network {network}")]
    MemberNotFound {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
    },

    /// The member may not receive a configuration.
    #[error("Access denied for {member} on network {network}: {reason}")]
    AccessDenied {
        /// Network id
        network: NetworkId,
        /// Member address
        member: NodeAddress,
        /// Why the gate refused
        reason: &'static str,
    },

    /// The requester asked again too soon.
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds until a request would be accepted
        retry_after_ms: u64,
    },

    /// The persistent store could not be reached.
    #[error("Temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),

    /// A stored record is corrupt or an invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Administrative input was rejected.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result code returned to the requesting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Configuration attached
    Ok,
    /// Unknown network
    NotFound,
    /// Member not authorized
    AccessDenied,
    /// Requested too frequently
    RateLimited,
    /// Store unreachable
    TemporarilyUnavailable,
    /// Unexpected failure
    InternalError,
}

impl ResultCode {
    /// Result code of a decision result.
    pub fn of<T>(result: &Result<T, ControllerError>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => ResultCode::from(e),
        }
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Ok => "ok",
            ResultCode::NotFound => "not_found",
            ResultCode::AccessDenied => "access_denied",
            ResultCode::RateLimited => "rate_limited",
            ResultCode::TemporarilyUnavailable => "temporarily_unavailable",
            ResultCode::InternalError => "internal_error",
        }
    }

    /// Whether the caller should retry later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResultCode::RateLimited | ResultCode::TemporarilyUnavailable
        )
    }
}

impl From<&ControllerError> for ResultCode {
    fn from(err: &ControllerError) -> Self {
        match err {
            ControllerError::NetworkNotFound(_) | ControllerError::MemberNotFound { .. } => {
                ResultCode::NotFound
            }
            ControllerError::AccessDenied { .. } => ResultCode::AccessDenied,
            ControllerError::RateLimited { .. } => ResultCode::RateLimited,
            ControllerError::TemporarilyUnavailable(_) => ResultCode::TemporarilyUnavailable,
            ControllerError::Internal(_) | ControllerError::InvalidRecord(_) => {
                ResultCode::InternalError
            }
        }
    }
}

/// Persistent store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend refused or could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// I/O error during read/write.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// A record could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A record decoded but contradicts its storage key.
    #[error("Corrupt record {key}: {reason}")]
    Corrupt {
        /// Storage key of the record
        key: String,
        /// What is wrong with it
        reason: String,
    },
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) | StoreError::Io(_) => {
                ControllerError::TemporarilyUnavailable(err.to_string())
            }
            StoreError::Serialization(_) | StoreError::Corrupt { .. } => {
                ControllerError::Internal(err.to_string())
            }
        }
    }
}

/// Identifier and prefix parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    /// Not a hexadecimal number of the right width.
    #[error("Invalid hex identifier: {0:?}")]
    InvalidHex(String),

    /// Node addresses are 40 bits wide.
    #[error("Node address out of range: {0:#x}")]
    AddressOutOfRange(u64),

    /// Address zero is reserved.
    #[error("Reserved node address")]
    ReservedAddress,

    /// Malformed `ip/bits` prefix.
    #[error("Invalid prefix: {0:?}")]
    InvalidPrefix(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config {path}: {error}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        error: String,
    },

    /// The file is not valid TOML for this schema.
    #[error("Cannot parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}
