use crate::collector::strava::StravaClient;
use crate::collector::tokens::save_token_grant;
use crate::config::{Config, resolve_secret};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use tracing::info;
use url::Url;

pub const CLIENT_ID_ENV: &str = "PACELAB_STRAVA_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "PACELAB_STRAVA_CLIENT_SECRET";

const AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
const REDIRECT_URI: &str = "http://localhost";
const SCOPE: &str = "read,activity:read_all";

/// Flag values for `pacelab auth`; anything missing is prompted for.
#[derive(Debug, Default)]
pub struct AuthArgs {
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

pub fn run_auth(mut config: Config, args: AuthArgs) -> Result<()> {
    println!("──────────────────────────────────────────");
    println!("  Strava authorization");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/3] Strava API application");
    let client_id = match pick(
        args.client_id,
        CLIENT_ID_ENV,
        config.strava_client_id.as_deref(),
    ) {
        Some(value) => value,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("  Client ID")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                let trimmed = input.trim();
                if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err("Client ID is numeric (see strava.com/settings/api)")
                }
            })
            .interact_text()
            .context("Failed to read Strava client ID")?,
    };
    let client_secret = match pick(
        args.client_secret,
        CLIENT_SECRET_ENV,
        config.strava_client_secret.as_deref(),
    ) {
        Some(value) => value,
        None => Password::with_theme(&theme)
            .with_prompt("  Client secret")
            .interact()
            .context("Failed to read Strava client secret")?,
    };
    println!("  ✓ Client ID {}", client_id.trim());

    println!("\n[2/3] Authorization code");
    let code = match args.code.filter(|value| !value.trim().is_empty()) {
        Some(value) => value,
        None => {
            println!("  Open this URL, approve access, then copy `code` from the redirect:");
            println!("  {}", authorize_url(client_id.trim())?);
            Input::<String>::with_theme(&theme)
                .with_prompt("  Code")
                .interact_text()
                .context("Failed to read authorization code")?
        }
    };

    println!("\n[3/3] Token exchange");
    let client = StravaClient::new(&config)?;
    let grant = client.exchange_code(client_id.trim(), client_secret.trim(), code.trim())?;
    save_token_grant(&config.tokens_path, &grant)?;
    info!(
        path = %config.tokens_path.display(),
        refresh_token_received = grant.has_refresh_token(),
        "Saved Strava token grant"
    );
    println!(
        "  ✓ Access token {} saved: {}",
        grant.access_token_hint(),
        config.tokens_path.display()
    );

    let remember = Confirm::with_theme(&theme)
        .with_prompt("  Store client ID and secret in config.json?")
        .default(false)
        .interact()
        .context("Failed to read confirmation input")?;

    if remember {
        config.strava_client_id = Some(client_id.trim().to_string());
        config.strava_client_secret = Some(client_secret.trim().to_string());
        config.save()?;
        println!("  ✓ Client credentials stored");
    }

    println!("\n──────────────────────────────────────────");
    println!("  Authorization complete. Next: pacelab fetch");
    println!("──────────────────────────────────────────");

    Ok(())
}

pub fn authorize_url(client_id: &str) -> Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", REDIRECT_URI),
            ("approval_prompt", "force"),
            ("scope", SCOPE),
        ],
    )
    .context("Failed to build Strava authorize URL")
}

fn pick(flag: Option<String>, env_key: &str, configured: Option<&str>) -> Option<String> {
    flag.filter(|value| !value.trim().is_empty())
        .or_else(|| resolve_secret(env_key, configured))
}
