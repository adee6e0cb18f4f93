// Rack controller HTTP client
//
// Wraps `reqwest::Client` with rack endpoint URL construction, bearer
// authentication and envelope unwrapping. One client talks to one rack.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{DhcpConfigError, DhcpPayload, IpVersion, RackResponse, ValidationData};
use crate::transport::TransportConfig;

/// HTTP client for one rack controller's DHCP service endpoints.
///
/// Handles the `{ status, message, data }` envelope. Methods return the
/// unwrapped `data` payload; a non-`ok` status becomes [`Error::Remote`].
#[derive(Clone)]
pub struct RackClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for RackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RackClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl RackClient {
    /// Create a client from a `TransportConfig`. `base_url` is the rack's
    /// service root, e.g. `https://rack-1.example:5249`.
    pub fn new(
        base_url: Url,
        token: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: None,
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Liveness probe. Any `ok` envelope means the rack is connected.
    pub async fn ping(&self) -> Result<(), Error> {
        let url = self.api_url("ping")?;
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        self.parse_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// Replace the running configuration of the `version` daemon.
    pub async fn configure_dhcp(
        &self,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<(), Error> {
        let url = self.dhcp_url(version, "configure")?;
        self.post::<serde_json::Value>(url, payload).await?;
        Ok(())
    }

    /// Ask the rack to check a document without applying it. An empty list
    /// means the daemon accepted it.
    pub async fn validate_dhcp_config(
        &self,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<Vec<DhcpConfigError>, Error> {
        let url = self.dhcp_url(version, "validate")?;
        let data: Option<ValidationData> = self.post(url, payload).await?;
        Ok(data.and_then(|d| d.errors).unwrap_or_default())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/v1/{path}`
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/v1/{path}"))?)
    }

    /// `{base}/api/v1/dhcp/{v4|v6}/{action}`
    fn dhcp_url(&self, version: IpVersion, action: &str) -> Result<Url, Error> {
        self.api_url(&format!("dhcp/{}/{action}", version.path_segment()))
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<Option<T>, Error> {
        debug!("POST {}", url);

        let resp = self
            .authorize(self.http.post(url))
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.parse_envelope(resp).await
    }

    /// Parse the `{ status, message, data }` envelope, returning `data` on
    /// success or an `Error::Remote` if `status != "ok"`.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Option<T>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        let envelope: RackResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(Error::Remote {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(e) => {
                return Err(Error::Deserialization {
                    message: e.to_string(),
                    body,
                });
            }
        };

        match envelope.status.as_str() {
            "ok" if status.is_success() => Ok(envelope.data),
            _ => Err(Error::Remote {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("status={}", envelope.status)),
            }),
        }
    }
}
