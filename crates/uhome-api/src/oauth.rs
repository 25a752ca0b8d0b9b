// OAuth2 session management for the U-home cloud.
//
// The API requires a valid bearer token on every call. The session owns
// the current token set and refreshes it lazily: callers ask for an
// access token and get either the cached one or the result of a
// `refresh_token` grant against the token endpoint.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::wire::endpoints;

/// Tokens are treated as expired this long before their actual expiry,
/// so a request issued just under the wire doesn't race the server clock.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ── Configuration ────────────────────────────────────────────────────

/// OAuth2 application credentials and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub authorize_url: Url,
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: String,
}

impl OAuthConfig {
    /// Config against the stock U-tec endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Result<Self, Error> {
        Ok(Self {
            authorize_url: Url::parse(endpoints::AUTHORIZE_ENDPOINT)?,
            token_url: Url::parse(endpoints::TOKEN_ENDPOINT)?,
            client_id: client_id.into(),
            client_secret,
            scope: endpoints::API_SCOPE.to_owned(),
        })
    }
}

// ── Token set ────────────────────────────────────────────────────────

/// An access/refresh token pair with its expiry instant.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn is_expired(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Build from a token endpoint response, carrying the previous
    /// refresh token forward when the server doesn't rotate it.
    fn from_response(resp: TokenResponse, previous_refresh: Option<SecretString>) -> Self {
        let refresh_token = resp
            .refresh_token
            .map(SecretString::from)
            .or(previous_refresh)
            .unwrap_or_else(|| SecretString::from(String::new()));

        Self {
            access_token: SecretString::from(resp.access_token),
            refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(resp.expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

// ── Session ──────────────────────────────────────────────────────────

/// Holds the live token set for one authenticated account.
///
/// The token mutex also serializes refreshes: concurrent callers hitting
/// an expired token perform exactly one `refresh_token` grant.
pub struct OAuthSession {
    http: reqwest::Client,
    config: OAuthConfig,
    token: Mutex<TokenSet>,
}

impl OAuthSession {
    pub fn new(http: reqwest::Client, config: OAuthConfig, initial: TokenSet) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(initial),
        }
    }

    /// Return a valid access token, refreshing first if the cached one
    /// has expired. Refresh failure is an authentication error.
    pub async fn access_token(&self) -> Result<SecretString, Error> {
        let mut guard = self.token.lock().await;

        if guard.is_expired() {
            debug!("access token expired, refreshing");
            let refreshed = self.refresh_grant(&guard.refresh_token).await?;
            *guard = refreshed;
        }

        Ok(guard.access_token.clone())
    }

    /// Snapshot of the current token set, for persistence by callers.
    pub async fn current_tokens(&self) -> TokenSet {
        self.token.lock().await.clone()
    }

    async fn refresh_grant(&self, refresh_token: &SecretString) -> Result<TokenSet, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];

        let resp = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("token refresh failed (HTTP {status}): {body}"),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("token refresh returned an unreadable body: {e}"),
            })?;

        Ok(TokenSet::from_response(
            parsed,
            Some(refresh_token.clone()),
        ))
    }

    /// Exchange an authorization code for a token set (initial login).
    pub async fn exchange_code(
        http: &reqwest::Client,
        config: &OAuthConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose_secret()),
        ];

        let resp = http
            .post(config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("code exchange failed (HTTP {status}): {body}"),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("code exchange returned an unreadable body: {e}"),
            })?;

        Ok(TokenSet::from_response(parsed, None))
    }

    /// The URL a user should visit to authorize this application.
    pub fn authorize_url(config: &OAuthConfig, redirect_uri: &str) -> Url {
        let mut url = config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &config.scope);
        url
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token_set(expires_in_secs: i64) -> TokenSet {
        TokenSet {
            access_token: SecretString::from("at".to_owned()),
            refresh_token: SecretString::from("rt".to_owned()),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in_secs),
        }
    }

    #[test]
    fn fresh_token_is_not_expired() {
        assert!(!token_set(3600).is_expired());
    }

    #[test]
    fn token_inside_margin_counts_as_expired() {
        assert!(token_set(EXPIRY_MARGIN_SECS - 5).is_expired());
        assert!(token_set(-10).is_expired());
    }

    #[test]
    fn refresh_token_carried_forward_when_not_rotated() {
        let resp = TokenResponse {
            access_token: "new-at".into(),
            refresh_token: None,
            expires_in: 100,
        };
        let set = TokenSet::from_response(resp, Some(SecretString::from("old-rt".to_owned())));
        assert_eq!(set.refresh_token.expose_secret(), "old-rt");
        assert_eq!(set.access_token.expose_secret(), "new-at");
    }

    #[test]
    fn authorize_url_carries_scope_and_client() {
        let config = OAuthConfig::new(
            "client-1",
            SecretString::from("secret".to_owned()),
        )
        .unwrap();
        let url = OAuthSession::authorize_url(&config, "http://localhost:8123/callback");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("client_id".into(), "client-1".into())));
        assert!(query.contains(&("scope".into(), "openapi".into())));
    }
}
