// ── Entity projection ──
//
// Renders store-held device records into the observable shapes a host
// (dashboard, bridge, CLI) consumes: a stable unique id, a registry
// info block for grouping, availability, and per-entity state
// snapshots. Projections also own the assumed-state handoff: after
// rendering a coordinator-driven update they clear the device's flag,
// so the notification AFTER the optimistic one is what clears it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::{CATEGORY_SMART_LOCK, Device, DeviceId, HealthStatus, LockState};
use crate::store::DeviceStore;

/// Identifier domain used in registry info blocks.
pub const DOMAIN: &str = "uhome";

pub const DEVICE_CLASS_BATTERY: &str = "battery";
pub const UNIT_PERCENT: &str = "%";

// ── Shared derivations ───────────────────────────────────────────────

/// Unique id: category + the last three colon-delimited id segments,
/// plus an optional device-class suffix.
///
/// `"aa:bb:cc:11:22:33"` / `SmartLock` / no class → `"SmartLock112233"`.
pub fn unique_id(device: &Device, device_class: Option<&str>) -> String {
    let segments: Vec<&str> = device.id.segments().collect();
    let start = segments.len().saturating_sub(3);
    let tail = segments[start..].concat();

    match device_class {
        Some(class) => format!("{}{tail}_{class}", device.category),
        None => format!("{}{tail}", device.category),
    }
}

/// A device is available exactly when its health is `Online`.
pub fn available(device: &Device) -> bool {
    device.health.as_ref().is_some_and(HealthStatus::is_online)
}

/// Registry info block surfaced for device grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRegistryInfo {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub hw_version: String,
}

pub fn registry_info(device: &Device) -> DeviceRegistryInfo {
    DeviceRegistryInfo {
        identifiers: (DOMAIN.to_owned(), device.id.as_str().to_owned()),
        name: device.name.clone(),
        manufacturer: device.info.manufacturer.clone(),
        model: device.info.model.clone(),
        hw_version: device.info.hw_version.clone(),
    }
}

// ── Lock entity ──────────────────────────────────────────────────────

/// Rendered lock state at one notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockEntityState {
    pub unique_id: String,
    pub name: String,
    pub available: bool,
    pub is_locked: bool,
    pub is_unlocked: bool,
    pub is_jammed: bool,
    pub assumed: bool,
}

/// Projects one SmartLock device from the store.
#[derive(Debug)]
pub struct LockEntity {
    store: Arc<DeviceStore>,
    id: DeviceId,
    unique_id: String,
}

impl LockEntity {
    pub fn new(store: Arc<DeviceStore>, device: &Device) -> Result<Self, CoreError> {
        if !device.is_smart_lock() {
            return Err(CoreError::SubtypeMismatch {
                id: device.id.clone(),
                expected: CATEGORY_SMART_LOCK.to_owned(),
                got: device.category.clone(),
            });
        }

        Ok(Self {
            store,
            unique_id: unique_id(device, None),
            id: device.id.clone(),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.id
    }

    /// Render the current state without touching the assumed flag.
    pub fn state(&self) -> Option<LockEntityState> {
        let device = self.store.get(&self.id)?;
        let attrs = device.as_smart_lock()?;

        Some(LockEntityState {
            unique_id: self.unique_id.clone(),
            name: device.name.clone(),
            available: available(&device),
            is_locked: attrs.lock_state == Some(LockState::Locked),
            is_unlocked: attrs.lock_state == Some(LockState::Unlocked),
            is_jammed: attrs.lock_state == Some(LockState::Jammed),
            assumed: attrs.assumed_state,
        })
    }

    /// Render a coordinator-driven update, then clear the assumed flag.
    ///
    /// The rendered state still carries the flag as it was; the clear
    /// becomes visible at the next notification.
    pub fn handle_update(&self) -> Option<LockEntityState> {
        let state = self.state();
        self.store.clear_assumed(&self.id);
        state
    }

    /// Lock through the optimistic command protocol.
    pub async fn lock(&self, coordinator: &Coordinator) -> Result<Duration, CoreError> {
        coordinator.lock(&self.id).await
    }

    /// Unlock through the optimistic command protocol.
    pub async fn unlock(&self, coordinator: &Coordinator) -> Result<Duration, CoreError> {
        coordinator.unlock(&self.id).await
    }
}

// ── Battery sensor ───────────────────────────────────────────────────

/// Rendered battery state at one notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatterySensorState {
    pub unique_id: String,
    pub available: bool,
    /// `level * 100 / max`; `None` until the first battery reading.
    pub percent: Option<f64>,
    pub unit: &'static str,
}

/// Diagnostic battery sensor for a device with a battery range.
pub struct BatterySensor {
    store: Arc<DeviceStore>,
    id: DeviceId,
    unique_id: String,
}

impl BatterySensor {
    pub fn new(store: Arc<DeviceStore>, device: &Device) -> Result<Self, CoreError> {
        if device.as_smart_lock().is_none() {
            return Err(CoreError::SubtypeMismatch {
                id: device.id.clone(),
                expected: CATEGORY_SMART_LOCK.to_owned(),
                got: device.category.clone(),
            });
        }

        Ok(Self {
            store,
            unique_id: unique_id(device, Some(DEVICE_CLASS_BATTERY)),
            id: device.id.clone(),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn state(&self) -> Option<BatterySensorState> {
        let device = self.store.get(&self.id)?;
        let attrs = device.as_smart_lock()?;

        Some(BatterySensorState {
            unique_id: self.unique_id.clone(),
            available: available(&device),
            percent: attrs.battery.percent(),
            unit: UNIT_PERCENT,
        })
    }

    /// Render a coordinator-driven update, then clear the assumed flag.
    pub fn handle_update(&self) -> Option<BatterySensorState> {
        let state = self.state();
        self.store.clear_assumed(&self.id);
        state
    }
}

// ── Construction over a store ────────────────────────────────────────

/// Build a lock entity for every SmartLock currently in the store.
pub fn lock_entities(store: &Arc<DeviceStore>) -> Vec<LockEntity> {
    store
        .snapshot()
        .iter()
        .filter(|d| d.is_smart_lock())
        .filter_map(|d| LockEntity::new(Arc::clone(store), d).ok())
        .collect()
}

/// Build a battery sensor for every battery-carrying device in the store.
pub fn battery_sensors(store: &Arc<DeviceStore>) -> Vec<BatterySensor> {
    store
        .snapshot()
        .iter()
        .filter(|d| d.as_smart_lock().is_some())
        .filter_map(|d| BatterySensor::new(Arc::clone(store), d).ok())
        .collect()
}
