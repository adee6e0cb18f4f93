use thiserror::Error;

/// Top-level error type for the `rackdhcp-api` crate.
///
/// Covers every failure mode of talking to a rack controller: transport,
/// authentication, daemon-level rejection and malformed responses.
/// `rackdhcp-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Authentication ──────────────────────────────────────────────
    /// The rack rejected our token.
    #[error("Rack rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    // ── Remote ──────────────────────────────────────────────────────
    /// The rack's DHCP service reported a failure (bad snippet, daemon
    /// refused to start, etc.).
    #[error("Rack reported an error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the rack could not be reached at all, as opposed
    /// to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }
}
