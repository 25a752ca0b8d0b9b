use thiserror::Error;

/// Top-level error type for the `uhome-api` crate.
///
/// Covers every failure mode of the wire layer: OAuth2 token handling,
/// HTTP transport, the action endpoint's error envelope, and response
/// decoding. `uhome-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token refresh or code exchange failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The API rejected the bearer token outright.
    #[error("Access token rejected by the API")]
    TokenRejected,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error from the action endpoint.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// A response was decodable but missing something the protocol
    /// requires (payload, the addressed device, a mandatory capability).
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::TokenRejected)
    }

    /// Returns `true` if this is a transient error worth retrying
    /// on the next poll tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
