//! Config command handlers: show, init, set-secret.

use dialoguer::{Confirm, Input};
use secrecy::SecretString;

use uhome_config as config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::runtime::active_profile_name;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => show(),
        ConfigCommand::Init => init(global),
        ConfigCommand::SetSecret => set_secret(global),
    }
}

fn show() -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();

    // Never print secret material.
    for profile in cfg.profiles.values_mut() {
        if profile.client_secret.is_some() {
            profile.client_secret = Some("***".into());
        }
    }

    println!("# {}", config::config_path().display());
    let rendered = toml::to_string_pretty(&cfg).map_err(|e| CliError::Config {
        message: e.to_string(),
    })?;
    println!("{rendered}");
    Ok(())
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let default_name = active_profile_name(global, &cfg);

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(default_name)
        .interact_text()
        .map_err(io_err)?;

    let existing = cfg.profiles.get(&profile_name);

    let client_id: String = Input::new()
        .with_prompt("OAuth client id")
        .with_initial_text(existing.map(|p| p.client_id.clone()).unwrap_or_default())
        .interact_text()
        .map_err(io_err)?;

    let poll_minutes: u64 = Input::new()
        .with_prompt("Poll interval (minutes, minimum 1)")
        .default(
            existing
                .and_then(|p| p.poll_interval_minutes)
                .unwrap_or(cfg.defaults.poll_interval_minutes),
        )
        .validate_with(|v: &u64| {
            if *v >= 1 {
                Ok(())
            } else {
                Err("poll interval must be at least 1 minute")
            }
        })
        .interact_text()
        .map_err(io_err)?;

    let mut profile = existing.cloned().unwrap_or_default();
    profile.client_id = client_id;
    profile.poll_interval_minutes = Some(poll_minutes);

    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }
    cfg.profiles.insert(profile_name.clone(), profile);
    config::save_config(&cfg)?;

    println!("Profile '{profile_name}' written to {}.", config::config_path().display());

    let store_secret = Confirm::new()
        .with_prompt("Store the client secret in the system keyring now?")
        .default(true)
        .interact()
        .map_err(io_err)?;

    if store_secret {
        prompt_and_store_secret(&profile_name)?;
    } else {
        println!("Later: uhome config set-secret --profile {profile_name}");
    }

    println!("Next: uhome auth login --profile {profile_name}");
    Ok(())
}

fn set_secret(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if !cfg.profiles.contains_key(&profile_name) {
        return Err(CliError::NoProfile {
            profile: profile_name,
            path: config::config_path().display().to_string(),
        });
    }

    prompt_and_store_secret(&profile_name)
}

fn prompt_and_store_secret(profile_name: &str) -> Result<(), CliError> {
    let secret = rpassword::prompt_password("OAuth client secret: ").map_err(io_err)?;
    config::store_client_secret(profile_name, &SecretString::from(secret))?;
    println!("Secret stored in the keyring for profile '{profile_name}'.");
    Ok(())
}

fn io_err(e: impl std::fmt::Display) -> CliError {
    CliError::Io {
        message: e.to_string(),
    }
}
