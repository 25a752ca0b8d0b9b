//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use uhome_core::CoreError;

/// Exit codes, stable for scripting.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No profile '{profile}' in {path}")]
    #[diagnostic(
        code(uhome::no_profile),
        help("Create one with: uhome config init")
    )]
    NoProfile { profile: String, path: String },

    #[error("No client secret configured for profile '{profile}'")]
    #[diagnostic(
        code(uhome::no_credentials),
        help(
            "Store one with: uhome config set-secret --profile {profile}\n\
             Or set the env var named in the profile's client_secret_env."
        )
    )]
    NoCredentials { profile: String },

    #[error("Not logged in for profile '{profile}'")]
    #[diagnostic(
        code(uhome::no_tokens),
        help("Run: uhome auth login --profile {profile}")
    )]
    NoTokens { profile: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(uhome::config))]
    Config { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(uhome::auth_failed),
        help(
            "The cached tokens may have been revoked.\n\
             Run: uhome auth login"
        )
    )]
    AuthFailed { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{id}' not found")]
    #[diagnostic(
        code(uhome::not_found),
        help("Run: uhome devices list to see discovered devices")
    )]
    DeviceNotFound { id: String },

    #[error("Device '{id}' is a {category}, not a SmartLock")]
    #[diagnostic(code(uhome::not_a_lock))]
    NotALock { id: String, category: String },

    // ── Everything else from the core ────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(uhome::core))]
    Core(CoreError),

    #[error("{message}")]
    #[diagnostic(code(uhome::io))]
    Io { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoProfile { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::NoCredentials { .. } | Self::NoTokens { .. } | Self::AuthFailed { .. } => {
                exit_code::AUTH
            }
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Core(CoreError::Api { .. }) => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::DeviceNotFound { id } => Self::DeviceNotFound { id: id.to_string() },
            CoreError::SubtypeMismatch { id, got, .. } => Self::NotALock {
                id: id.to_string(),
                category: got,
            },
            CoreError::Config { message } => Self::Config { message },
            other => Self::Core(other),
        }
    }
}

impl From<uhome_config::ConfigError> for CliError {
    fn from(err: uhome_config::ConfigError) -> Self {
        match err {
            uhome_config::ConfigError::NoCredentials { profile } => {
                Self::NoCredentials { profile }
            }
            uhome_config::ConfigError::NoTokens { profile } => Self::NoTokens { profile },
            uhome_config::ConfigError::Io(e) => Self::Io {
                message: e.to_string(),
            },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
