//! Shared configuration for rackdhcp.
//!
//! TOML layered with environment overrides, rack token resolution
//! (env + keyring + plaintext), and translation to
//! `rackdhcp_core::EngineSettings` and rack transport settings. The CLI
//! adds flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use rackdhcp_api::{TlsMode, TransportConfig};
use rackdhcp_core::EngineSettings;
use rackdhcp_core::settings::DEFAULT_DOMAIN;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service every rack token is stored under.
pub const KEYRING_SERVICE: &str = "rackdhcp";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no token found for rack '{rack}'")]
    NoCredentials { rack: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Output and transport defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Fleet-wide DHCP settings.
    #[serde(default)]
    pub dhcp: DhcpSection,

    /// Rack controller endpoints, keyed by hostname.
    #[serde(default)]
    pub racks: BTreeMap<String, RackProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            insecure: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_domain() -> String {
    DEFAULT_DOMAIN.into()
}
fn default_true() -> bool {
    true
}

/// `[dhcp]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DhcpSection {
    #[serde(default)]
    pub ntp_servers: Vec<String>,

    #[serde(default)]
    pub ntp_external_only: bool,

    #[serde(default = "default_domain")]
    pub default_domain: String,

    #[serde(default)]
    pub search_domains: Vec<String>,

    #[serde(default)]
    pub region_dns: Vec<IpAddr>,

    #[serde(default = "default_true")]
    pub use_rack_proxy: bool,
}

impl Default for DhcpSection {
    fn default() -> Self {
        Self {
            ntp_servers: Vec::new(),
            ntp_external_only: false,
            default_domain: default_domain(),
            search_domains: Vec::new(),
            region_dns: Vec::new(),
            use_rack_proxy: true,
        }
    }
}

/// One rack controller endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RackProfile {
    /// Base URL of the rack's DHCP service (e.g., "https://10.0.0.2:5250").
    pub url: String,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "rackdhcp", "rackdhcp").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("rackdhcp");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing files are fine) layered under `RACKDHCP_*`
/// environment variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RACKDHCP_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn rack(&self, hostname: &str) -> Option<&RackProfile> {
        self.racks.get(hostname)
    }

    /// Settings for the synthesis engine.
    pub fn to_engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let dhcp = &self.dhcp;
        if dhcp.default_domain.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "dhcp.default_domain".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.defaults.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "defaults.timeout".into(),
                reason: "must be at least one second".into(),
            });
        }

        Ok(EngineSettings {
            rpc_timeout: Duration::from_secs(self.defaults.timeout),
            ntp_servers: dhcp.ntp_servers.clone(),
            ntp_external_only: dhcp.ntp_external_only,
            default_domain: dhcp.default_domain.clone(),
            search_domains: dhcp.search_domains.clone(),
            region_dns: dhcp.region_dns.clone(),
            use_rack_proxy: dhcp.use_rack_proxy,
        })
    }

    /// Transport settings for one rack, rack overrides first.
    pub fn rack_transport(&self, rack: &RackProfile) -> TransportConfig {
        let tls = if rack.insecure.unwrap_or(self.defaults.insecure) {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = rack.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        let timeout = Duration::from_secs(rack.timeout.unwrap_or(self.defaults.timeout));
        TransportConfig::new(timeout).with_tls(tls)
    }

    /// Everything needed to build a client for `hostname`.
    pub fn rack_endpoint(&self, hostname: &str) -> Result<RackEndpoint, ConfigError> {
        let rack = self.rack(hostname).ok_or_else(|| ConfigError::Validation {
            field: "racks".into(),
            reason: format!("no rack named '{hostname}' is configured"),
        })?;
        let url: Url = rack.url.parse().map_err(|_| ConfigError::Validation {
            field: format!("racks.{hostname}.url"),
            reason: format!("invalid URL: {}", rack.url),
        })?;

        Ok(RackEndpoint {
            hostname: hostname.to_owned(),
            url,
            token: resolve_token(rack, hostname)?,
            transport: self.rack_transport(rack),
        })
    }
}

/// A fully resolved rack connection target.
#[derive(Debug, Clone)]
pub struct RackEndpoint {
    pub hostname: String,
    pub url: Url,
    pub token: Option<SecretString>,
    pub transport: TransportConfig,
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a rack's bearer token.
///
/// Order: `token_env` → keyring (`rackdhcp`, `<hostname>/token`) →
/// plaintext. A rack with no token configured anywhere talks without
/// one, unless it names a `token_env` that turned up empty.
pub fn resolve_token(
    rack: &RackProfile,
    hostname: &str,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Rack's token_env → env var lookup
    if let Some(ref env_name) = rack.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(val)));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{hostname}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Some(SecretString::from(secret)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = rack.token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    if rack.token_env.is_some() {
        return Err(ConfigError::NoCredentials {
            rack: hostname.into(),
        });
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const UNSET_VAR: &str = "RACKDHCP_TEST_TOKEN_NEVER_SET_9F3A";

    fn rack(url: &str) -> RackProfile {
        RackProfile {
            url: url.into(),
            token: None,
            token_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }

    fn load(toml: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.dhcp, DhcpSection::default());
        assert!(cfg.racks.is_empty());
    }

    #[test]
    fn toml_sections_map_to_engine_settings() {
        let cfg = load(
            r#"
            [defaults]
            timeout = 12

            [dhcp]
            ntp_servers = ["ntp.example.com"]
            ntp_external_only = true
            default_domain = "lab"
            search_domains = ["lab", "example.com"]
            region_dns = ["10.0.0.53", "fd00::53"]
            use_rack_proxy = false

            [racks.rack-1]
            url = "https://10.0.0.2:5250"
            token = "t0k3n"
            "#,
        );

        let settings = cfg.to_engine_settings().unwrap();
        assert_eq!(settings.rpc_timeout, Duration::from_secs(12));
        assert_eq!(settings.ntp_servers, vec!["ntp.example.com".to_owned()]);
        assert!(settings.ntp_external_only);
        assert_eq!(settings.default_domain, "lab");
        assert_eq!(settings.region_dns.len(), 2);
        assert!(!settings.use_rack_proxy);
        assert_eq!(cfg.rack("rack-1").unwrap().url, "https://10.0.0.2:5250");
    }

    #[test]
    fn empty_domain_is_rejected() {
        let mut cfg = Config::default();
        cfg.dhcp.default_domain = "  ".into();
        let err = cfg.to_engine_settings().unwrap_err();
        assert!(err.to_string().contains("dhcp.default_domain"));
    }

    #[test]
    fn rack_overrides_transport_defaults() {
        let mut cfg = Config::default();
        cfg.defaults.insecure = true;
        let mut r = rack("https://10.0.0.2");
        r.insecure = Some(false);
        r.ca_cert = Some(PathBuf::from("/etc/rackdhcp/ca.pem"));
        r.timeout = Some(5);

        let transport = cfg.rack_transport(&r);
        assert!(matches!(transport.tls, TlsMode::CustomCa(_)));
        assert_eq!(transport.timeout, Duration::from_secs(5));

        let transport = cfg.rack_transport(&rack("https://10.0.0.3"));
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_rack_url_names_the_field() {
        let mut cfg = Config::default();
        cfg.racks.insert("rack-1".into(), rack("not a url"));
        let err = cfg.rack_endpoint("rack-1").unwrap_err();
        assert!(err.to_string().contains("racks.rack-1.url"), "{err}");
    }

    #[test]
    fn unknown_rack_is_a_validation_error() {
        let err = Config::default().rack_endpoint("nope").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let mut r = rack("https://10.0.0.2");
        r.token_env = Some(UNSET_VAR.into());
        r.token = Some("plain".into());
        let token = resolve_token(&r, "rack-test-plaintext").unwrap().unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn named_but_unset_token_env_is_an_error() {
        let mut r = rack("https://10.0.0.2");
        r.token_env = Some(UNSET_VAR.into());
        let err = resolve_token(&r, "rack-test-missing").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn save_then_load_keeps_racks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.racks.insert("rack-1".into(), rack("https://10.0.0.2"));
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.racks["rack-1"].url, "https://10.0.0.2");
    }
}
