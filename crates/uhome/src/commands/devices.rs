//! Device command handlers.

use tabled::Tabled;

use uhome_core::{Device, DeviceId, entity};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::runtime::Runtime;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Battery")]
    battery: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            category: d.category.clone(),
            health: health_str(d),
            lock: lock_str(d),
            battery: battery_str(d),
        }
    }
}

fn health_str(d: &Device) -> String {
    d.health.as_ref().map_or_else(|| "-".into(), ToString::to_string)
}

fn lock_str(d: &Device) -> String {
    match d.as_smart_lock() {
        Some(attrs) => {
            let state = attrs
                .lock_state
                .map_or_else(|| "-".into(), |s| s.to_string());
            if attrs.assumed_state {
                format!("{state} (assumed)")
            } else {
                state
            }
        }
        None => String::new(),
    }
}

fn battery_str(d: &Device) -> String {
    d.as_smart_lock()
        .and_then(|attrs| attrs.battery.percent())
        .map_or_else(String::new, |pct| format!("{pct:.0}%"))
}

fn detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:           {}", d.id),
        format!("Name:         {}", d.name),
        format!("Category:     {}", d.category),
        format!("Manufacturer: {}", d.info.manufacturer),
        format!("Model:        {}", d.info.model),
        format!("HW version:   {}", d.info.hw_version),
        format!("Health:       {}", health_str(d)),
        format!("Unique id:    {}", entity::unique_id(d, None)),
        format!("Available:    {}", entity::available(d)),
    ];

    if let Some(attrs) = d.as_smart_lock() {
        lines.push(format!("Handle type:  {}", attrs.handle_type.0));
        lines.push(format!("Lock state:   {}", lock_str(d)));
        lines.push(format!(
            "Battery:      {} (range {}..{} step {})",
            battery_str(d),
            attrs.battery.min,
            attrs.battery.max,
            attrs.battery.step,
        ));
    }

    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(
    runtime: &Runtime,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            runtime.start().await?;
            let devices = runtime.coordinator.devices();

            let rendered = output::render_list(
                &global.output,
                devices.as_slice(),
                |d: &Device| DeviceRow::from(d),
                |d| d.id.to_string(),
            );
            println!("{rendered}");
            Ok(())
        }

        DevicesCommand::Show { id } => {
            runtime.start().await?;
            let device_id = DeviceId::new(id.clone());
            let device = runtime
                .coordinator
                .store()
                .get(&device_id)
                .ok_or(CliError::DeviceNotFound { id })?;

            let rendered = output::render_single(&global.output, &device, detail);
            println!("{rendered}");
            Ok(())
        }
    }
}
