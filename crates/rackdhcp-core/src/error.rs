// ── Core error types ──
//
// Domain errors from rackdhcp-core. Consumers never see HTTP status codes
// or JSON parse failures directly: the `From<rackdhcp_api::Error>` impl
// translates transport-layer errors into rack-level variants.

use rackdhcp_api::IpVersion;
use thiserror::Error;

use crate::model::EntityId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Range algebra ────────────────────────────────────────────────
    #[error("Address family mismatch: {left} and {right} cannot share one range set")]
    AddressFamilyMismatch { left: String, right: String },

    #[error("Invalid address range: {message}")]
    InvalidRange { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// No usable interface or address ties a rack to the network it must
    /// serve. Raised before any RPC is attempted.
    #[error("Topology error: {message}")]
    Topology { message: String },

    /// The data set is internally inconsistent, or validation cannot
    /// proceed (e.g. no connected rack can check a snippet).
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Inventory error: {message}")]
    Inventory { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Rack {rack} is not connected: {reason}")]
    RackUnavailable { rack: EntityId, reason: String },

    #[error("Rack rejected {version} configuration: {message}")]
    RemoteConfiguration { version: IpVersion, message: String },

    #[error("Rack call timed out after {timeout_secs}s")]
    RemoteTimeout { timeout_secs: u64 },

    #[error("Rack rejected credentials: {message}")]
    AuthenticationFailed { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.to_string(),
        }
    }

    /// Attach the rack and address family to an error converted from the
    /// transport layer, which knows neither.
    pub(crate) fn in_context(self, rack: EntityId, version: IpVersion) -> Self {
        match self {
            Self::RemoteConfiguration { message, .. } => {
                Self::RemoteConfiguration { version, message }
            }
            Self::RackUnavailable { reason, .. } => Self::RackUnavailable { rack, reason },
            other => other,
        }
    }

    /// `true` when the rack could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::RackUnavailable { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<rackdhcp_api::Error> for CoreError {
    fn from(err: rackdhcp_api::Error) -> Self {
        match err {
            rackdhcp_api::Error::Transport(ref e) if e.is_timeout() => {
                CoreError::RemoteTimeout { timeout_secs: 0 }
            }
            rackdhcp_api::Error::Transport(ref e) if e.is_connect() => {
                CoreError::RackUnavailable {
                    rack: EntityId::UNKNOWN,
                    reason: e.to_string(),
                }
            }
            rackdhcp_api::Error::Transport(e) => CoreError::RemoteConfiguration {
                version: IpVersion::V4,
                message: e.to_string(),
            },
            rackdhcp_api::Error::Timeout { timeout_secs } => {
                CoreError::RemoteTimeout { timeout_secs }
            }
            rackdhcp_api::Error::Tls(msg) => CoreError::RackUnavailable {
                rack: EntityId::UNKNOWN,
                reason: format!("TLS error: {msg}"),
            },
            rackdhcp_api::Error::InvalidUrl(e) => {
                CoreError::Internal(format!("Invalid rack URL: {e}"))
            }
            rackdhcp_api::Error::Unauthorized { status } => CoreError::AuthenticationFailed {
                message: format!("HTTP {status}"),
            },
            rackdhcp_api::Error::Remote { message, .. } => CoreError::RemoteConfiguration {
                version: IpVersion::V4,
                message,
            },
            rackdhcp_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
