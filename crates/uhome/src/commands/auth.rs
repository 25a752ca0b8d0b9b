//! Authentication handlers: authorization-code login and token status.

use chrono::Utc;
use dialoguer::Input;

use uhome_api::{OAuthSession, TransportConfig};
use uhome_config as config;

use crate::cli::{AuthArgs, AuthCommand, GlobalOpts};
use crate::error::CliError;
use crate::runtime::active_profile_name;

/// Fallback redirect URI for manual copy/paste flows.
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8400/callback";

pub async fn handle(args: AuthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        AuthCommand::Login => login(global).await,
        AuthCommand::Status => status(global),
    }
}

async fn login(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::NoProfile {
            profile: profile_name.clone(),
            path: config::config_path().display().to_string(),
        })?;

    let oauth = config::resolve_oauth_config(profile, &profile_name)?;
    let redirect_uri = profile
        .redirect_uri
        .clone()
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.into());

    println!("Open this URL in a browser and authorize the application:\n");
    println!("  {}\n", OAuthSession::authorize_url(&oauth, &redirect_uri));
    println!("After authorizing you will be redirected to {redirect_uri}.");
    println!("Copy the `code` query parameter from the redirect URL.\n");

    let code: String = Input::new()
        .with_prompt("Authorization code")
        .interact_text()
        .map_err(|e| CliError::Io {
            message: e.to_string(),
        })?;

    let http = TransportConfig::default()
        .build_client()
        .map_err(uhome_core::CoreError::from)?;
    let tokens = OAuthSession::exchange_code(&http, &oauth, code.trim(), &redirect_uri)
        .await
        .map_err(uhome_core::CoreError::from)?;

    config::save_tokens(&profile_name, &tokens)?;

    println!(
        "\nLogged in. Tokens cached for profile '{profile_name}' (expires {}).",
        tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn status(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let tokens = config::load_tokens(&profile_name)?;

    println!("Profile:     {profile_name}");
    println!(
        "Expires at:  {}",
        tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if tokens.expires_at <= Utc::now() {
        println!("Status:      expired (will refresh on next use)");
    } else {
        println!("Status:      valid");
    }
    Ok(())
}
