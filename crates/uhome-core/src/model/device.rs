// ── Device domain types ──
//
// A device record is created once per discovery and mutated in place by
// every poll: static identity fields never change, state fields start
// unknown and are updated independently per capability.

use serde::Serialize;
use strum::{Display, EnumString};
use tracing::warn;

use uhome_api::wire::{CapabilityState, capability};

use super::device_id::DeviceId;
use super::lock::{LockAttributes, first_value};

/// Category tag for the one specialized subtype.
pub const CATEGORY_SMART_LOCK: &str = "SmartLock";

/// Health reported by `st.healthCheck`. Availability means exactly
/// [`Online`](HealthStatus::Online).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display, EnumString)]
pub enum HealthStatus {
    Online,
    Offline,
    /// A health value this crate doesn't recognize, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl HealthStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Static device-info triple from discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub hw_version: String,
}

/// Category-discriminated device payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeviceKind {
    /// Category `SmartLock`: handle type, battery, bolt state.
    SmartLock(LockAttributes),
    /// Every other category carries no extra fields.
    Generic,
}

/// A U-home device held for the lifetime of the account session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub category: String,
    pub info: DeviceInfo,
    /// `st.healthCheck` -- unknown until the first state query.
    pub health: Option<HealthStatus>,
    pub kind: DeviceKind,
}

impl Device {
    /// Update from a states array. The base fields update first, then
    /// the subtype's own fields -- cumulative, never overriding.
    /// A capability absent from `states` leaves its field unchanged.
    pub fn apply_states(&mut self, states: &[CapabilityState]) {
        if let Some(value) = first_value(states, capability::HEALTH_CHECK) {
            match value.as_str() {
                Some(raw) => self.health = raw.parse::<HealthStatus>().ok(),
                None => warn!(%value, "non-string st.healthCheck value, keeping previous status"),
            }
        }

        if let DeviceKind::SmartLock(attrs) = &mut self.kind {
            attrs.apply_states(states);
        }
    }

    pub fn is_smart_lock(&self) -> bool {
        matches!(self.kind, DeviceKind::SmartLock(_))
    }

    pub fn as_smart_lock(&self) -> Option<&LockAttributes> {
        match &self.kind {
            DeviceKind::SmartLock(attrs) => Some(attrs),
            DeviceKind::Generic => None,
        }
    }

    pub fn as_smart_lock_mut(&mut self) -> Option<&mut LockAttributes> {
        match &mut self.kind {
            DeviceKind::SmartLock(attrs) => Some(attrs),
            DeviceKind::Generic => None,
        }
    }
}
