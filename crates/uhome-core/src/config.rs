// ── Runtime coordinator configuration ──
//
// Carries poll tuning only. Credentials and endpoints live in
// `uhome_api::OAuthConfig`; the config crate builds both -- core never
// reads config files.

use std::time::Duration;

use tracing::warn;

/// Default poll period: five minutes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Floor for the poll period. The cloud API is rate-limited; anything
/// below a minute gets clamped.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often the poll task queries device states.
    pub poll_interval: Duration,
}

impl CoordinatorConfig {
    /// Build with an explicit poll interval, clamping to the minimum.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        let clamped = if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                requested_secs = poll_interval.as_secs(),
                min_secs = MIN_POLL_INTERVAL.as_secs(),
                "poll interval below minimum, clamping"
            );
            MIN_POLL_INTERVAL
        } else {
            poll_interval
        };

        Self {
            poll_interval: clamped,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
