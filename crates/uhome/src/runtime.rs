//! Builds the connected runtime (OAuth session + coordinator) from the
//! active profile, and persists rotated tokens on the way out.

use std::sync::Arc;

use tracing::{debug, warn};

use uhome_api::{OAuthSession, TransportConfig, UhomeClient};
use uhome_core::Coordinator;
use uhome_config as config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A connected CLI session: coordinator plus the OAuth session backing
/// it, so rotated tokens can be written back to the cache.
pub struct Runtime {
    pub coordinator: Coordinator,
    pub session: Arc<OAuthSession>,
    pub profile_name: String,
}

/// Resolve the active profile name: CLI flag, then config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &config::Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

impl Runtime {
    /// Assemble the runtime from config. Does not touch the network.
    ///
    /// `poll_override` replaces the profile's poll period (minutes) when
    /// given, e.g. for `watch --interval`.
    pub fn build(global: &GlobalOpts, poll_override: Option<u64>) -> Result<Self, CliError> {
        let cfg = config::load_config_or_default();
        let profile_name = active_profile_name(global, &cfg);

        let profile = cfg
            .profiles
            .get(&profile_name)
            .ok_or_else(|| CliError::NoProfile {
                profile: profile_name.clone(),
                path: config::config_path().display().to_string(),
            })?;

        let oauth = config::resolve_oauth_config(profile, &profile_name)?;
        let tokens = config::load_tokens(&profile_name)?;

        let mut transport = TransportConfig::default();
        if let Some(secs) = global.timeout {
            transport.timeout = std::time::Duration::from_secs(secs);
        } else {
            transport.timeout = config::request_timeout(profile, &cfg.defaults);
        }

        let http = transport.build_client().map_err(uhome_core::CoreError::from)?;
        let session = Arc::new(OAuthSession::new(http, oauth, tokens));

        let client = match &profile.api_url {
            Some(url) => UhomeClient::with_endpoint(url, Arc::clone(&session), &transport),
            None => UhomeClient::new(Arc::clone(&session), &transport),
        }
        .map_err(uhome_core::CoreError::from)?;

        let mut coordinator_config = config::coordinator_config(profile, &cfg.defaults);
        if let Some(minutes) = poll_override {
            coordinator_config = uhome_core::CoordinatorConfig::with_poll_interval(
                std::time::Duration::from_secs(minutes.max(1) * 60),
            );
        }

        debug!(profile = profile_name, "runtime assembled");

        Ok(Self {
            coordinator: Coordinator::new(client, coordinator_config),
            session,
            profile_name,
        })
    }

    /// Discover devices and begin polling.
    pub async fn start(&self) -> Result<(), CliError> {
        self.coordinator.start().await?;
        Ok(())
    }

    /// Persist rotated tokens and stop the coordinator.
    pub async fn finish(&self) {
        let tokens = self.session.current_tokens().await;
        if let Err(e) = config::save_tokens(&self.profile_name, &tokens) {
            warn!(error = %e, "failed to persist rotated tokens");
        }
        self.coordinator.shutdown().await;
    }
}
