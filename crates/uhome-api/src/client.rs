// Hand-crafted async HTTP client for the U-home OpenAPI.
//
// All device operations are POSTs of a `{header, payload}` envelope to a
// single action endpoint, authenticated with a bearer token obtained
// from the OAuth session on every call.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::oauth::OAuthSession;
use crate::transport::TransportConfig;
use crate::wire::{
    DeviceRecord, DeviceRef, Header, Request, RequestPayload, Response, capability, endpoints, op,
};

// ── Error response shape from the action endpoint ────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the U-home action endpoint.
///
/// Cheap to clone; the OAuth session is shared so every clone draws
/// tokens from the same refresh state.
#[derive(Clone)]
pub struct UhomeClient {
    http: reqwest::Client,
    endpoint: Url,
    session: Arc<OAuthSession>,
}

impl UhomeClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build against the stock U-tec endpoint.
    pub fn new(session: Arc<OAuthSession>, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint: Url::parse(endpoints::API_ENDPOINT)?,
            session,
        })
    }

    /// Build against a custom endpoint (self-hosted relays, tests).
    pub fn with_endpoint(
        endpoint: &str,
        session: Arc<OAuthSession>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint)?,
            session,
        })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        endpoint: &str,
        http: reqwest::Client,
        session: Arc<OAuthSession>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint)?,
            session,
        })
    }

    /// The OAuth session backing this client.
    pub fn session(&self) -> &Arc<OAuthSession> {
        &self.session
    }

    // ── Envelope POST ────────────────────────────────────────────────

    async fn send(&self, name: &str, payload: RequestPayload) -> Result<Response, Error> {
        let token = self.session.access_token().await?;

        debug!("POST {} name={name}", self.endpoint);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(token.expose_secret())
            .json(&Request {
                header: Header::device_op(name),
                payload,
            })
            .send()
            .await?;

        self.handle_response(resp).await
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<Response, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::TokenRejected;
        }

        let raw = resp.text().await.unwrap_or_default();

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(&raw) {
            Error::Api {
                status: status.as_u16(),
                message: err.message.unwrap_or_else(|| status.to_string()),
                code: err.code,
            }
        } else {
            Error::Api {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                code: None,
            }
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Enumerate all devices on the account, in server order.
    ///
    /// A response without a payload or device list yields an empty vec.
    pub async fn discover(&self) -> Result<Vec<DeviceRecord>, Error> {
        let resp = self.send(op::DISCOVERY, RequestPayload::default()).await?;
        debug!(count = resp.payload.devices.len(), "discovery response");
        Ok(resp.payload.devices)
    }

    /// Fetch current state records for the given device ids.
    pub async fn query(&self, ids: &[String]) -> Result<Vec<DeviceRecord>, Error> {
        let resp = self.send(op::QUERY, Self::id_payload(ids)).await?;
        Ok(resp.payload.devices)
    }

    /// Issue a lock command for one device, returning the vendor's
    /// deferred-response duration.
    pub async fn lock_device(&self, id: &str) -> Result<Duration, Error> {
        let resp = self
            .send(op::LOCK, Self::id_payload(&[id.to_owned()]))
            .await?;
        Self::deferred_response(id, &resp.payload.devices)
    }

    /// Issue an unlock command for one device, returning the vendor's
    /// deferred-response duration.
    pub async fn unlock_device(&self, id: &str) -> Result<Duration, Error> {
        let resp = self
            .send(op::UNLOCK, Self::id_payload(&[id.to_owned()]))
            .await?;
        Self::deferred_response(id, &resp.payload.devices)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn id_payload(ids: &[String]) -> RequestPayload {
        RequestPayload {
            devices: ids
                .iter()
                .map(|id| DeviceRef { id: id.clone() })
                .collect(),
        }
    }

    /// Extract `st.deferredResponse` for `id` from a command response.
    ///
    /// The duration is mandatory: a command response without it gives the
    /// caller no way to know when reconciliation is possible, so its
    /// absence is a malformed response, not a zero wait.
    fn deferred_response(id: &str, records: &[DeviceRecord]) -> Result<Duration, Error> {
        let record = records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::MalformedResponse {
                message: format!("command response is missing device {id}"),
            })?;

        let value = record
            .state_value(capability::DEFERRED_RESPONSE)
            .ok_or_else(|| Error::MalformedResponse {
                message: format!(
                    "command response for {id} carries no {} state",
                    capability::DEFERRED_RESPONSE
                ),
            })?;

        let secs = value
            .as_f64()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or_else(|| Error::MalformedResponse {
                message: format!(
                    "{} for {id} is not a non-negative number: {value}",
                    capability::DEFERRED_RESPONSE
                ),
            })?;

        Ok(Duration::from_secs_f64(secs))
    }
}
