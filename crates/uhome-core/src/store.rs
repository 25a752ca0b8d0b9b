// ── Reactive device store ──
//
// Holds the authoritative device list between polls. Devices are created
// once per discovery and mutated in place by every state application;
// each mutation batch rebuilds a snapshot that is broadcast to
// subscribers via a `watch` channel.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use uhome_api::wire::DeviceRecord;

use crate::error::CoreError;
use crate::model::{CATEGORY_SMART_LOCK, Device, DeviceId, LockState};

/// Counts from one query-response application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Devices whose states were applied.
    pub updated: usize,
    /// Requested devices the response omitted; they keep stale state.
    pub missing: usize,
}

/// Reactive store for the discovered device set.
///
/// Snapshots are rebuilt per mutation batch and broadcast with
/// `send_modify`, which notifies unconditionally -- subscribers hear
/// about every refresh, whether or not any field changed.
#[derive(Debug)]
pub struct DeviceStore {
    devices: DashMap<DeviceId, Device>,
    /// Server discovery order; snapshots preserve it.
    order: RwLock<Vec<DeviceId>>,
    snapshot: watch::Sender<Arc<Vec<Device>>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_refresh, _) = watch::channel(None);

        Self {
            devices: DashMap::new(),
            order: RwLock::new(Vec::new()),
            snapshot,
            last_refresh,
        }
    }

    // ── Population ───────────────────────────────────────────────────

    /// Replace the full device set with a discovery result.
    pub fn replace_all(&self, devices: Vec<Device>) {
        self.devices.clear();
        let mut order = Vec::with_capacity(devices.len());

        for device in devices {
            order.push(device.id.clone());
            self.devices.insert(device.id.clone(), device);
        }

        *self.write_order() = order;
        self.rebuild_snapshot();
    }

    // ── State application ────────────────────────────────────────────

    /// Apply a query response to the stored devices.
    ///
    /// For every stored device, the FIRST response record with a matching
    /// id is applied; devices the response omits keep their last-known
    /// state and are counted (and logged) rather than treated as errors.
    /// Exactly one snapshot rebuild and notification happens per call.
    pub fn apply_query_response(&self, records: &[DeviceRecord]) -> QueryOutcome {
        let ids = self.ids();
        let mut outcome = QueryOutcome {
            updated: 0,
            missing: 0,
        };

        for id in &ids {
            let record = records.iter().find(|r| r.id == id.as_str());
            match record {
                Some(record) => {
                    if let Some(mut device) = self.devices.get_mut(id) {
                        device.apply_states(&record.states);
                        debug!(id = %id, states = record.states.len(), "updated device state");
                        outcome.updated += 1;
                    }
                }
                None => {
                    warn!(id = %id, "query response omitted device, state is stale");
                    outcome.missing += 1;
                }
            }
        }

        let _ = self.last_refresh.send(Some(Utc::now()));
        self.rebuild_snapshot();
        outcome
    }

    /// Optimistically set a lock's state after a command was issued.
    ///
    /// Marks the device's assumed-state flag and notifies subscribers
    /// synchronously, so observers see the commanded state immediately.
    pub fn set_optimistic_lock_state(
        &self,
        id: &DeviceId,
        target: LockState,
    ) -> Result<(), CoreError> {
        {
            let mut device = self
                .devices
                .get_mut(id)
                .ok_or_else(|| CoreError::DeviceNotFound { id: id.clone() })?;

            let category = device.category.clone();
            let attrs = device
                .as_smart_lock_mut()
                .ok_or_else(|| CoreError::SubtypeMismatch {
                    id: id.clone(),
                    expected: CATEGORY_SMART_LOCK.to_owned(),
                    got: category,
                })?;

            attrs.lock_state = Some(target);
            attrs.assumed_state = true;
        }

        self.rebuild_snapshot();
        Ok(())
    }

    /// Clear a device's assumed-state flag without notifying.
    ///
    /// The flag change rides along with the next snapshot rebuild,
    /// mirroring how an observer clears the flag after rendering.
    pub fn clear_assumed(&self, id: &DeviceId) {
        if let Some(mut device) = self.devices.get_mut(id) {
            if let Some(attrs) = device.as_smart_lock_mut() {
                attrs.assumed_state = false;
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        self.devices.get(id).map(|d| d.value().clone())
    }

    /// Device ids in discovery order.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.read_order().clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Current snapshot (cheap `Arc` clone), in discovery order.
    pub fn snapshot(&self) -> Arc<Vec<Device>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Device>>> {
        self.snapshot.subscribe()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let order = self.read_order();
        let values: Vec<Device> = order
            .iter()
            .filter_map(|id| self.devices.get(id).map(|d| d.value().clone()))
            .collect();
        drop(order);

        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn read_order(&self) -> std::sync::RwLockReadGuard<'_, Vec<DeviceId>> {
        self.order.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_order(&self) -> std::sync::RwLockWriteGuard<'_, Vec<DeviceId>> {
        self.order.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::convert::device_from_record;
    use uhome_api::wire::DeviceRecord;

    fn record(value: serde_json::Value) -> DeviceRecord {
        serde_json::from_value(value).unwrap()
    }

    fn lock_device(id: &str) -> Device {
        device_from_record(&record(json!({
            "id": id,
            "name": format!("Lock {id}"),
            "category": "SmartLock",
            "deviceInfo": { "manufacturer": "U-tec", "model": "U-Bolt", "hwVersion": "1.0" },
            "handleType": "utec-lock",
            "attributes": { "batteryLevelRange": { "min": 0, "max": 100, "step": 1 } }
        })))
        .unwrap()
    }

    fn populated_store() -> DeviceStore {
        let store = DeviceStore::new();
        store.replace_all(vec![lock_device("aa:bb:cc:11:22:33"), lock_device("dd:ee:ff:44:55:66")]);
        store
    }

    #[test]
    fn replace_all_preserves_server_order() {
        let store = populated_store();
        let snap = store.snapshot();
        assert_eq!(snap[0].id.as_str(), "aa:bb:cc:11:22:33");
        assert_eq!(snap[1].id.as_str(), "dd:ee:ff:44:55:66");
    }

    #[test]
    fn query_subset_updates_exactly_the_matched_devices() {
        let store = populated_store();

        let outcome = store.apply_query_response(&[record(json!({
            "id": "aa:bb:cc:11:22:33",
            "states": [ { "capability": "st.lock", "value": "Locked" } ]
        }))]);

        assert_eq!(outcome, QueryOutcome { updated: 1, missing: 1 });

        let updated = store.get(&DeviceId::new("aa:bb:cc:11:22:33")).unwrap();
        assert_eq!(
            updated.as_smart_lock().unwrap().lock_state,
            Some(LockState::Locked)
        );

        let untouched = store.get(&DeviceId::new("dd:ee:ff:44:55:66")).unwrap();
        assert!(untouched.as_smart_lock().unwrap().lock_state.is_none());
    }

    #[test]
    fn first_matching_record_wins() {
        let store = populated_store();

        store.apply_query_response(&[
            record(json!({
                "id": "aa:bb:cc:11:22:33",
                "states": [ { "capability": "st.lock", "value": "Locked" } ]
            })),
            record(json!({
                "id": "aa:bb:cc:11:22:33",
                "states": [ { "capability": "st.lock", "value": "Unlocked" } ]
            })),
        ]);

        let device = store.get(&DeviceId::new("aa:bb:cc:11:22:33")).unwrap();
        assert_eq!(
            device.as_smart_lock().unwrap().lock_state,
            Some(LockState::Locked)
        );
    }

    #[tokio::test]
    async fn subscribers_are_notified_even_when_nothing_changed() {
        let store = populated_store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        // No states at all -- still one notification per application.
        store.apply_query_response(&[]);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn optimistic_update_sets_flag_and_notifies() {
        let store = populated_store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        let id = DeviceId::new("aa:bb:cc:11:22:33");
        store
            .set_optimistic_lock_state(&id, LockState::Locked)
            .unwrap();

        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        let attrs = snap[0].as_smart_lock().unwrap();
        assert_eq!(attrs.lock_state, Some(LockState::Locked));
        assert!(attrs.assumed_state);
    }

    #[tokio::test]
    async fn clear_assumed_is_silent() {
        let store = populated_store();
        let id = DeviceId::new("aa:bb:cc:11:22:33");
        store
            .set_optimistic_lock_state(&id, LockState::Locked)
            .unwrap();

        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.clear_assumed(&id);
        assert!(!rx.has_changed().unwrap());

        // The cleared flag is visible on the next rebuild.
        store.apply_query_response(&[]);
        let snap = rx.borrow_and_update().clone();
        assert!(!snap[0].as_smart_lock().unwrap().assumed_state);
    }

    #[test]
    fn optimistic_update_on_generic_device_is_a_subtype_mismatch() {
        let store = DeviceStore::new();
        let mut device = lock_device("aa:bb:cc:11:22:33");
        device.kind = crate::model::DeviceKind::Generic;
        device.category = "Bridge".into();
        store.replace_all(vec![device]);

        let err = store
            .set_optimistic_lock_state(&DeviceId::new("aa:bb:cc:11:22:33"), LockState::Locked)
            .unwrap_err();
        assert!(matches!(err, CoreError::SubtypeMismatch { .. }));
    }

    #[test]
    fn optimistic_update_on_unknown_device_is_not_found() {
        let store = DeviceStore::new();
        let err = store
            .set_optimistic_lock_state(&DeviceId::new("nope"), LockState::Locked)
            .unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }
}
