//! Continuous watch: run the coordinator and print every state update.

use chrono::Local;
use owo_colors::OwoColorize;

use uhome_core::{Device, PollState, entity};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;
use crate::runtime::Runtime;

pub async fn handle(
    runtime: &Runtime,
    _args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    runtime.start().await?;

    let store = runtime.coordinator.store();
    let mut updates = store.subscribe();
    let mut poll_state = runtime.coordinator.poll_state();

    let color = output::should_color(&global.color);

    if !global.quiet {
        eprintln!("Watching {} device(s). Ctrl-C to stop.", store.len());
    }
    print_snapshot(&updates.borrow_and_update().clone(), store);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&updates.borrow_and_update().clone(), store);
            }
            changed = poll_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *poll_state.borrow_and_update();
                if state == PollState::Degraded {
                    if color {
                        eprintln!("{}", "poll failed, showing last-known state".yellow());
                    } else {
                        eprintln!("poll failed, showing last-known state");
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_snapshot(devices: &[Device], store: &std::sync::Arc<uhome_core::DeviceStore>) {
    let stamp = Local::now().format("%H:%M:%S");

    for device in devices {
        println!("[{stamp}] {}", describe(device));
    }

    // Rendering an update is what clears pending assumed flags; mirror
    // that behavior so a commanded state stops reading "(assumed)" once
    // a later update has been shown.
    for entity in entity::lock_entities(store) {
        entity.handle_update();
    }
}

fn describe(device: &Device) -> String {
    let health = device
        .health
        .as_ref()
        .map_or_else(|| "unknown".into(), ToString::to_string);

    match device.as_smart_lock() {
        Some(attrs) => {
            let lock = attrs
                .lock_state
                .map_or_else(|| "unknown".into(), |s| s.to_string());
            let assumed = if attrs.assumed_state { " (assumed)" } else { "" };
            let battery = attrs
                .battery
                .percent()
                .map_or_else(String::new, |p| format!(" battery={p:.0}%"));
            format!(
                "{} [{}] health={health} lock={lock}{assumed}{battery}",
                device.name, device.id
            )
        }
        None => format!("{} [{}] health={health}", device.name, device.id),
    }
}
