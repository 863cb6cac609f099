use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".pacelab";
const CONFIG_FILE: &str = "config.json";
const HOME_ENV: &str = "PACELAB_HOME";
pub const MAX_PER_PAGE: u32 = 200;
const MAX_HOLDOUT_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strava_access_token: Option<String>,
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub strava_api_base_url: String,
    pub strava_oauth_url: String,
    pub tokens_path: PathBuf,
    pub dataset_path: PathBuf,
    pub output_dir: PathBuf,
    pub lookback_activities: u32,
    pub holdout_fraction: f64,
    pub http_timeout_seconds: u64,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            strava_access_token: None,
            strava_client_id: None,
            strava_client_secret: None,
            strava_api_base_url: "https://www.strava.com/api/v3".to_string(),
            strava_oauth_url: "https://www.strava.com/oauth/token".to_string(),
            tokens_path: root.join("strava_tokens.json"),
            dataset_path: root.join("data").join("runs.csv"),
            output_dir: root.join("reports"),
            lookback_activities: 50,
            holdout_fraction: 0.2,
            http_timeout_seconds: 30,
            ai_enabled: true,
            ai_api_key: None,
            ai_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            ai_model: "gemini-2.5-flash".to_string(),
            ai_timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        default_root_dir().join(CONFIG_FILE)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        set_mode_600(path)?;

        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.dataset_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create dataset directory: {}", parent.display())
            })?;
        }

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "strava_access_token" => {
                self.strava_access_token = non_empty(value);
            }
            "strava_client_id" => {
                self.strava_client_id = non_empty(value);
            }
            "strava_client_secret" => {
                self.strava_client_secret = non_empty(value);
            }
            "strava_api_base_url" => {
                self.strava_api_base_url = parse_base_url(value)?;
            }
            "strava_oauth_url" => {
                self.strava_oauth_url = parse_base_url(value)?;
            }
            "tokens_path" => {
                self.tokens_path = expand_home(value);
            }
            "dataset_path" => {
                self.dataset_path = expand_home(value);
            }
            "output_dir" => {
                self.output_dir = expand_home(value);
            }
            "lookback_activities" => {
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("lookback_activities must be a number"))?;
                if parsed == 0 {
                    bail!("lookback_activities must be at least 1");
                }
                self.lookback_activities = parsed;
            }
            "holdout_fraction" => {
                self.holdout_fraction = parse_holdout_fraction(value)?;
            }
            "http_timeout_seconds" => {
                self.http_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("http_timeout_seconds must be a number"))?
                    .max(5);
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = non_empty(value);
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = parse_base_url(value)?;
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: strava_access_token|strava.access_token, strava_client_id|strava.client_id, strava_client_secret|strava.client_secret, strava_api_base_url|strava.base_url, strava_oauth_url|strava.oauth_url, tokens_path|strava.tokens_path, dataset_path|dataset.path, output_dir|output.dir, lookback_activities|fetch.lookback, holdout_fraction|forecast.holdout, http_timeout_seconds|http.timeout_seconds, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "strava_access_token" => Some(mask_secret(self.strava_access_token.as_deref())),
            "strava_client_id" => Some(
                self.strava_client_id
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "strava_client_secret" => Some(mask_secret(self.strava_client_secret.as_deref())),
            "strava_api_base_url" => Some(self.strava_api_base_url.clone()),
            "strava_oauth_url" => Some(self.strava_oauth_url.clone()),
            "tokens_path" => Some(self.tokens_path.display().to_string()),
            "dataset_path" => Some(self.dataset_path.display().to_string()),
            "output_dir" => Some(self.output_dir.display().to_string()),
            "lookback_activities" => Some(self.lookback_activities.to_string()),
            "holdout_fraction" => Some(self.holdout_fraction.to_string()),
            "http_timeout_seconds" => Some(self.http_timeout_seconds.to_string()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(mask_secret(self.ai_api_key.as_deref())),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "strava_access_token" | "strava.access_token" => "strava_access_token",
        "strava_client_id" | "strava.client_id" => "strava_client_id",
        "strava_client_secret" | "strava.client_secret" => "strava_client_secret",
        "strava_api_base_url" | "strava.base_url" => "strava_api_base_url",
        "strava_oauth_url" | "strava.oauth_url" => "strava_oauth_url",
        "tokens_path" | "strava.tokens_path" => "tokens_path",
        "dataset_path" | "dataset.path" => "dataset_path",
        "output_dir" | "output.dir" => "output_dir",
        "lookback_activities" | "fetch.lookback" => "lookback_activities",
        "holdout_fraction" | "forecast.holdout" => "holdout_fraction",
        "http_timeout_seconds" | "http.timeout_seconds" => "http_timeout_seconds",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        _ => key,
    }
}

pub fn parse_holdout_fraction(value: &str) -> Result<f64> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow!("holdout_fraction must be a number"))?;

    if !(0.0..=MAX_HOLDOUT_FRACTION).contains(&parsed) {
        bail!("holdout_fraction must be between 0.0 and {MAX_HOLDOUT_FRACTION}");
    }

    Ok(parsed)
}

/// Reads a secret from the environment first, falling back to the config value.
pub fn resolve_secret(env_key: &str, configured: Option<&str>) -> Option<String> {
    std::env::var(env_key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|value| !value.trim().is_empty())
                .map(ToOwned::to_owned)
        })
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn parse_base_url(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    Url::parse(trimmed).with_context(|| format!("Invalid URL: {trimmed}"))?;
    Ok(trimmed.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.trim().to_string())
}

fn mask_secret(value: Option<&str>) -> String {
    value
        .map(|_| "***set***".to_string())
        .unwrap_or_else(|| "not_set".to_string())
}

fn default_root_dir() -> PathBuf {
    std::env::var(HOME_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| expand_home(&value))
        .unwrap_or_else(|| {
            home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
}

pub(crate) fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_holdout_fraction, resolve_secret};

    #[test]
    fn set_value_accepts_dotted_aliases() {
        let mut config = Config::default();

        config.set_value("fetch.lookback", "120").expect("lookback set");
        config.set_value("forecast.holdout", "0.25").expect("holdout set");
        config
            .set_value("ai.base_url", "https://api.openai.com/v1/")
            .expect("base url set");

        assert_eq!(config.lookback_activities, 120);
        assert_eq!(config.holdout_fraction, 0.25);
        assert_eq!(config.ai_api_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn rejects_out_of_range_holdout_and_zero_lookback() {
        let mut config = Config::default();

        assert!(config.set_value("holdout_fraction", "0.95").is_err());
        assert!(config.set_value("holdout_fraction", "-0.1").is_err());
        assert!(config.set_value("lookback_activities", "0").is_err());
        assert!(parse_holdout_fraction("0").is_ok());
    }

    #[test]
    fn get_value_masks_secrets() {
        let mut config = Config::default();
        config
            .set_value("strava.access_token", "abc123")
            .expect("token set");

        assert_eq!(
            config.get_value("strava_access_token").as_deref(),
            Some("***set***")
        );
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("not_set"));
        assert!(config.get_value("unknown_key").is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.set_value("ai_model", "gpt-4o-mini").expect("model set");
        config.save_to(&path).expect("config saved");

        let loaded = Config::load_from(&path).expect("config loaded");
        assert_eq!(loaded.ai_model, "gpt-4o-mini");
        assert_eq!(loaded.lookback_activities, 50);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"lookback_activities": 10}"#).expect("config written");

        let loaded = Config::load_from(&path).expect("config loaded");
        assert_eq!(loaded.lookback_activities, 10);
        assert_eq!(loaded.holdout_fraction, 0.2);
    }

    #[test]
    fn resolve_secret_ignores_blank_config_values() {
        assert_eq!(
            resolve_secret("PACELAB_TEST_UNSET_SECRET", Some("  ")),
            None
        );
        assert_eq!(
            resolve_secret("PACELAB_TEST_UNSET_SECRET", Some("key")).as_deref(),
            Some("key")
        );
    }
}
