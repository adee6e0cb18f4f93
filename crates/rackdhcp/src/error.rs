//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use rackdhcp_config::ConfigError;
use rackdhcp_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const VALIDATION_FAILED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Inventory ────────────────────────────────────────────────────

    #[error("No inventory given")]
    #[diagnostic(
        code(rackdhcp::no_inventory),
        help("Pass --inventory <FILE> or set RACKDHCP_INVENTORY.")
    )]
    NoInventory,

    #[error("Could not load inventory: {reason}")]
    #[diagnostic(code(rackdhcp::inventory))]
    Inventory { reason: String },

    // ── Connection ───────────────────────────────────────────────────

    #[error("Rack '{rack}' is not reachable: {reason}")]
    #[diagnostic(
        code(rackdhcp::rack_unavailable),
        help(
            "Check that the rack's DHCP service is running and that\n\
             [racks.{rack}] in the config file points at it.\n\
             Run: rackdhcp config show"
        )
    )]
    RackUnavailable { rack: String, reason: String },

    #[error("Rack rejected the token")]
    #[diagnostic(
        code(rackdhcp::auth_failed),
        help("Store a fresh token with: rackdhcp config set-token <rack>")
    )]
    AuthFailed { message: String },

    #[error("No token found for rack '{rack}'")]
    #[diagnostic(
        code(rackdhcp::no_credentials),
        help(
            "The configured token_env is unset.\n\
             Export it, or run: rackdhcp config set-token {rack}"
        )
    )]
    NoCredentials { rack: String },

    #[error("Rack call timed out after {seconds}s")]
    #[diagnostic(
        code(rackdhcp::timeout),
        help("Increase timeout with --timeout or check rack responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("{message}")]
    #[diagnostic(code(rackdhcp::remote))]
    Remote { message: String },

    // ── Data ─────────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(rackdhcp::not_found),
        help("Check the identifier against the inventory document.")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Topology error: {message}")]
    #[diagnostic(
        code(rackdhcp::topology),
        help(
            "A rack must have an interface with a sticky or auto address on\n\
             every VLAN it serves. Inspect with: rackdhcp topology interfaces"
        )
    )]
    Topology { message: String },

    #[error("Rack reported {count} configuration error(s)")]
    #[diagnostic(code(rackdhcp::config_rejected))]
    ConfigRejected { count: usize },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rackdhcp::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Rack '{name}' is not configured")]
    #[diagnostic(
        code(rackdhcp::rack_not_configured),
        help(
            "Add a [racks.{name}] section with its url to:\n\
             {path}"
        )
    )]
    RackNotConfigured { name: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(rackdhcp::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(rackdhcp::json))]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    #[diagnostic(code(rackdhcp::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(rackdhcp::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RackUnavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::ConfigRejected { .. } => exit_code::VALIDATION_FAILED,
            Self::NoInventory | Self::Validation { .. } | Self::RackNotConfigured { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type,
                identifier,
            },

            CoreError::Topology { message } => CliError::Topology { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Inventory { message } => CliError::Inventory { reason: message },

            CoreError::AddressFamilyMismatch { .. } | CoreError::InvalidRange { .. } => {
                CliError::Validation {
                    field: "range".into(),
                    reason: err.to_string(),
                }
            }

            CoreError::RackUnavailable { rack, reason } => CliError::RackUnavailable {
                rack: rack.to_string(),
                reason,
            },

            CoreError::RemoteConfiguration { .. } => CliError::Remote {
                message: err.to_string(),
            },

            CoreError::RemoteTimeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { rack } => CliError::NoCredentials { rack },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

impl From<rackdhcp_api::Error> for CliError {
    fn from(err: rackdhcp_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
