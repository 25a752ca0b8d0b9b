// Wire types for the U-home action endpoint.
//
// Every call is a POST of `{header, payload}` to a single endpoint; the
// response mirrors the shape. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Vendor endpoints and protocol constants.
pub mod endpoints {
    /// The single action endpoint all device calls go through.
    pub const API_ENDPOINT: &str = "https://api.u-tec.com/action";
    /// OAuth2 authorization endpoint.
    pub const AUTHORIZE_ENDPOINT: &str = "https://oauth.u-tec.com/authorize";
    /// OAuth2 token endpoint.
    pub const TOKEN_ENDPOINT: &str = "https://oauth.u-tec.com/token";
    /// OAuth2 scope required for the device API.
    pub const API_SCOPE: &str = "openapi";
}

/// Capability keys recognized in `states` arrays.
pub mod capability {
    pub const HEALTH_CHECK: &str = "st.healthCheck";
    pub const LOCK: &str = "st.lock";
    pub const BATTERY_LEVEL: &str = "st.batteryLevel";
    pub const DEFERRED_RESPONSE: &str = "st.deferredResponse";
}

pub const NAMESPACE_DEVICE: &str = "Uhome.Device";
pub const PAYLOAD_VERSION: &str = "1";

/// Operation names within the `Uhome.Device` namespace.
pub mod op {
    pub const DISCOVERY: &str = "Discovery";
    pub const QUERY: &str = "Query";
    pub const LOCK: &str = "Lock";
    pub const UNLOCK: &str = "Unlock";
}

// ── Envelope ─────────────────────────────────────────────────────────

/// Request/response header. Each request carries a fresh `messageId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub payload_version: String,
}

impl Header {
    /// Build a request header for a device-namespace operation.
    pub fn device_op(name: &str) -> Self {
        Self {
            namespace: NAMESPACE_DEVICE.to_owned(),
            name: name.to_owned(),
            message_id: Uuid::new_v4().to_string(),
            payload_version: PAYLOAD_VERSION.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Request {
    pub header: Header,
    pub payload: RequestPayload,
}

#[derive(Debug, Default, Serialize)]
pub struct RequestPayload {
    /// Device address list for Query/Lock/Unlock. Empty for Discovery.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceRef>,
}

/// A device addressed by id in a request payload.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRef {
    pub id: String,
}

/// Full response envelope. A missing payload is treated as empty, per
/// the vendor's behavior of omitting it on no-op responses.
#[derive(Debug, Deserialize)]
pub struct Response {
    pub header: Option<Header>,
    #[serde(default)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

// ── Device records ───────────────────────────────────────────────────

/// Static device info carried in discovery records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfoRecord {
    pub manufacturer: String,
    pub model: String,
    pub hw_version: String,
}

/// `attributes.batteryLevelRange` from a SmartLock discovery record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatteryRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAttributes {
    pub battery_level_range: Option<BatteryRange>,
}

/// One `{capability, value}` pair from a `states` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityState {
    pub capability: String,
    pub value: Value,
}

/// A raw device record, as it appears in discovery and state responses.
///
/// Discovery records carry the static fields; query/command responses
/// carry only `id` plus `states`, so everything but the id is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub device_info: Option<DeviceInfoRecord>,
    #[serde(default)]
    pub handle_type: Option<String>,
    #[serde(default)]
    pub attributes: Option<DeviceAttributes>,
    #[serde(default)]
    pub states: Vec<CapabilityState>,
}

impl DeviceRecord {
    /// First state value for `capability`, if present.
    pub fn state_value(&self, capability: &str) -> Option<&Value> {
        self.states
            .iter()
            .find(|s| s.capability == capability)
            .map(|s| &s.value)
    }
}
