// uhome-core: Device model and reactive data layer between uhome-api
// and consumers.

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use coordinator::{Coordinator, LockCommand, PollState};
pub use error::CoreError;
pub use store::{DeviceStore, QueryOutcome};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BatteryStatus, CATEGORY_SMART_LOCK, Device, DeviceId, DeviceInfo, DeviceKind, HandleType,
    HealthStatus, LockAttributes, LockState,
};
