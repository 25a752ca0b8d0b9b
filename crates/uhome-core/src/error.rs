// ── Core error types ──
//
// User-facing errors from uhome-core. These are NOT wire-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<uhome_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::model::DeviceId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: DeviceId },

    /// A record's category does not match the subtype being constructed
    /// or commanded. Fatal for that record.
    #[error("Device {id} has category {got}, expected {expected}")]
    SubtypeMismatch {
        id: DeviceId,
        expected: String,
        got: String,
    },

    /// Expected payload, device, or capability missing where the
    /// protocol requires it. Raised loudly rather than proceeding with
    /// undefined data.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    // ── Command errors ───────────────────────────────────────────────
    /// The deferred-response wait was cancelled by shutdown. The device
    /// is left with its assumed state flagged; reconciliation never ran.
    #[error("Command for {id} cancelled during the deferred wait")]
    Cancelled { id: DeviceId },

    #[error("Coordinator is not running")]
    NotRunning,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<uhome_api::Error> for CoreError {
    fn from(err: uhome_api::Error) -> Self {
        match err {
            uhome_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            uhome_api::Error::TokenRejected => CoreError::AuthenticationFailed {
                message: "access token rejected by the API".into(),
            },
            uhome_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                code: None,
                status: e.status().map(|s| s.as_u16()),
            },
            uhome_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            uhome_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            uhome_api::Error::MalformedResponse { message } => {
                CoreError::MalformedResponse { message }
            }
            uhome_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
