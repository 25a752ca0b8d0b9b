// ── Domain model ──

mod device;
mod device_id;
mod lock;

pub use device::{CATEGORY_SMART_LOCK, Device, DeviceInfo, DeviceKind, HealthStatus};
pub use device_id::DeviceId;
pub use lock::{BatteryStatus, HandleType, LockAttributes, LockState};
