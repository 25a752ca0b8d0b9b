// uhome-api: Async Rust client for the U-home cloud device API

pub mod client;
pub mod error;
pub mod oauth;
pub mod transport;
pub mod wire;

pub use client::UhomeClient;
pub use error::Error;
pub use oauth::{OAuthConfig, OAuthSession, TokenSet};
pub use transport::TransportConfig;
