// ── SmartLock domain types ──

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::warn;

use uhome_api::wire::{BatteryRange, CapabilityState, capability};

/// Bolt state reported by `st.lock`. Unknown until the first state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
pub enum LockState {
    Locked,
    Unlocked,
    Jammed,
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

/// Vendor handle-type tag, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HandleType(pub String);

/// Battery range from discovery plus the mutable current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    pub min: i64,
    pub max: i64,
    pub step: i64,
    /// `st.batteryLevel` -- unknown until the first state query.
    pub level: Option<i64>,
}

impl BatteryStatus {
    pub fn from_range(range: BatteryRange) -> Self {
        Self {
            min: range.min,
            max: range.max,
            step: range.step,
            level: None,
        }
    }

    /// Charge as a percentage of the range maximum.
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        if self.max == 0 {
            return None;
        }
        self.level.map(|level| level as f64 * 100.0 / self.max as f64)
    }

    /// Update the level from a states array. A missing `st.batteryLevel`
    /// leaves the level at its last-known value.
    pub fn apply_states(&mut self, states: &[CapabilityState]) {
        if let Some(value) = first_value(states, capability::BATTERY_LEVEL) {
            match value.as_i64() {
                Some(level) => self.level = Some(level),
                None => warn!(%value, "unreadable st.batteryLevel value, keeping previous level"),
            }
        }
    }
}

/// The SmartLock-specific slice of a device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockAttributes {
    pub handle_type: HandleType,
    pub battery: BatteryStatus,
    /// `st.lock` -- unknown until the first state query.
    pub lock_state: Option<LockState>,
    /// True while a commanded state is held locally, pending
    /// confirmation from a later poll.
    pub assumed_state: bool,
}

impl LockAttributes {
    pub fn new(handle_type: HandleType, battery_range: BatteryRange) -> Self {
        Self {
            handle_type,
            battery: BatteryStatus::from_range(battery_range),
            lock_state: None,
            assumed_state: false,
        }
    }

    /// Update lock-specific fields. Each capability is independent:
    /// absence leaves the field unchanged.
    pub fn apply_states(&mut self, states: &[CapabilityState]) {
        self.battery.apply_states(states);

        if let Some(value) = first_value(states, capability::LOCK) {
            match value.as_str().and_then(|s| s.parse::<LockState>().ok()) {
                Some(state) => self.lock_state = Some(state),
                None => warn!(%value, "unrecognized st.lock value, keeping previous state"),
            }
        }
    }
}

/// First state value for `key`, if present.
pub(crate) fn first_value<'a>(states: &'a [CapabilityState], key: &str) -> Option<&'a Value> {
    states.iter().find(|s| s.capability == key).map(|s| &s.value)
}
