// ── Wire record → domain device conversion ──
//
// Discovery records are dispatched on their category tag: exactly one
// category (`SmartLock`) has a specialized constructor with extra
// required fields; everything else becomes a generic device.

use tracing::info;

use uhome_api::wire::DeviceRecord;

use crate::error::CoreError;
use crate::model::{
    CATEGORY_SMART_LOCK, Device, DeviceId, DeviceInfo, DeviceKind, HandleType, LockAttributes,
};

/// Map a full discovery response, preserving server order and logging
/// each device. A record that fails construction fails the discovery.
pub fn devices_from_discovery(records: &[DeviceRecord]) -> Result<Vec<Device>, CoreError> {
    let mut devices = Vec::with_capacity(records.len());
    for record in records {
        let device = device_from_record(record)?;
        info!(
            category = device.category,
            name = device.name,
            id = %device.id,
            "discovered device"
        );
        devices.push(device);
    }
    Ok(devices)
}

/// Construct the right device subtype for a discovery record.
pub fn device_from_record(record: &DeviceRecord) -> Result<Device, CoreError> {
    let category = required(record, record.category.as_deref(), "category")?;
    if category == CATEGORY_SMART_LOCK {
        smart_lock_from_record(record)
    } else {
        let (id, name, category, info) = base_fields(record)?;
        Ok(Device {
            id,
            name,
            category,
            info,
            health: None,
            kind: DeviceKind::Generic,
        })
    }
}

/// Construct a SmartLock device. Fails with [`CoreError::SubtypeMismatch`]
/// when the record's category is anything else.
pub fn smart_lock_from_record(record: &DeviceRecord) -> Result<Device, CoreError> {
    let category = required(record, record.category.as_deref(), "category")?;
    if category != CATEGORY_SMART_LOCK {
        return Err(CoreError::SubtypeMismatch {
            id: DeviceId::new(record.id.clone()),
            expected: CATEGORY_SMART_LOCK.to_owned(),
            got: category.to_owned(),
        });
    }

    let (id, name, category, info) = base_fields(record)?;

    let handle_type = required(record, record.handle_type.as_deref(), "handleType")?;
    let battery_range = record
        .attributes
        .as_ref()
        .and_then(|a| a.battery_level_range)
        .ok_or_else(|| CoreError::MalformedResponse {
            message: format!(
                "discovery record {} is missing attributes.batteryLevelRange",
                record.id
            ),
        })?;

    Ok(Device {
        id,
        name,
        category,
        info,
        health: None,
        kind: DeviceKind::SmartLock(LockAttributes::new(
            HandleType(handle_type.to_owned()),
            battery_range,
        )),
    })
}

// ── Helpers ──────────────────────────────────────────────────────────

fn base_fields(record: &DeviceRecord) -> Result<(DeviceId, String, String, DeviceInfo), CoreError> {
    let name = required(record, record.name.as_deref(), "name")?.to_owned();
    let category = required(record, record.category.as_deref(), "category")?.to_owned();
    let info = record
        .device_info
        .as_ref()
        .ok_or_else(|| CoreError::MalformedResponse {
            message: format!("discovery record {} is missing deviceInfo", record.id),
        })?;

    Ok((
        DeviceId::new(record.id.clone()),
        name,
        category,
        DeviceInfo {
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            hw_version: info.hw_version.clone(),
        },
    ))
}

fn required<'a>(
    record: &DeviceRecord,
    field: Option<&'a str>,
    field_name: &str,
) -> Result<&'a str, CoreError> {
    field.ok_or_else(|| CoreError::MalformedResponse {
        message: format!("discovery record {} is missing {field_name}", record.id),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> DeviceRecord {
        serde_json::from_value(value).unwrap()
    }

    fn lock_record() -> DeviceRecord {
        record(json!({
            "id": "aa:bb:cc:11:22:33",
            "name": "Front Door",
            "category": "SmartLock",
            "deviceInfo": { "manufacturer": "U-tec", "model": "U-Bolt", "hwVersion": "1.0" },
            "handleType": "utec-lock",
            "attributes": { "batteryLevelRange": { "min": 0, "max": 100, "step": 1 } }
        }))
    }

    fn bridge_record() -> DeviceRecord {
        record(json!({
            "id": "dd:ee:ff:44:55:66",
            "name": "Hub",
            "category": "Bridge",
            "deviceInfo": { "manufacturer": "U-tec", "model": "Bridge", "hwVersion": "2.1" }
        }))
    }

    #[test]
    fn smart_lock_category_yields_smart_lock_kind() {
        let device = device_from_record(&lock_record()).unwrap();
        assert!(device.is_smart_lock());
        assert_eq!(device.as_smart_lock().unwrap().battery.max, 100);
    }

    #[test]
    fn other_categories_yield_generic_kind() {
        let device = device_from_record(&bridge_record()).unwrap();
        assert!(!device.is_smart_lock());
        assert_eq!(device.category, "Bridge");
    }

    #[test]
    fn smart_lock_constructor_rejects_other_categories() {
        let err = smart_lock_from_record(&bridge_record()).unwrap_err();
        match err {
            CoreError::SubtypeMismatch { expected, got, .. } => {
                assert_eq!(expected, "SmartLock");
                assert_eq!(got, "Bridge");
            }
            other => panic!("expected SubtypeMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn smart_lock_without_handle_type_is_malformed() {
        let mut bad = lock_record();
        bad.handle_type = None;
        assert!(matches!(
            device_from_record(&bad),
            Err(CoreError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn smart_lock_without_battery_range_is_malformed() {
        let mut bad = lock_record();
        bad.attributes = None;
        assert!(matches!(
            device_from_record(&bad),
            Err(CoreError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn discovery_preserves_server_order() {
        let devices = devices_from_discovery(&[bridge_record(), lock_record()]).unwrap();
        assert_eq!(devices[0].category, "Bridge");
        assert_eq!(devices[1].category, "SmartLock");
    }

    #[test]
    fn mutable_fields_start_unknown() {
        let device = device_from_record(&lock_record()).unwrap();
        assert!(device.health.is_none());
        let attrs = device.as_smart_lock().unwrap();
        assert!(attrs.lock_state.is_none());
        assert!(attrs.battery.level.is_none());
        assert!(!attrs.assumed_state);
    }
}
