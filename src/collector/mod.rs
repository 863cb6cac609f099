pub mod strava;
pub mod tokens;

use crate::collector::strava::StravaClient;
use crate::config::{Config, MAX_PER_PAGE, resolve_secret};
use crate::error::PipelineError;
use anyhow::Result;
use serde::Deserialize;
use tracing::info;

pub const ACCESS_TOKEN_ENV: &str = "PACELAB_STRAVA_ACCESS_TOKEN";

/// One activity as returned by the athlete activities listing.
///
/// Every attribute is optional here so that "missing in the response" stays
/// distinguishable from "reported as zero" until the cleaner applies its
/// default policy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivityRecord {
    pub name: Option<String>,
    pub start_date_local: Option<String>,
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub total_elevation_gain: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub sport_type: Option<String>,
}

impl ActivityRecord {
    pub fn kind(&self) -> Option<&str> {
        self.activity_type
            .as_deref()
            .or(self.sport_type.as_deref())
            .map(str::trim)
    }

    pub fn is_run(&self) -> bool {
        self.kind() == Some("Run")
    }
}

/// Fetches up to `lookback_activities` of the athlete's most recent activities.
pub fn fetch_recent_activities(config: &Config) -> Result<Vec<ActivityRecord>> {
    let access_token = resolve_access_token(config)?;
    let client = StravaClient::new(config)?;
    let (per_page, pages) = page_plan(config.lookback_activities);
    let limit = config.lookback_activities as usize;

    let mut activities = Vec::with_capacity(limit);
    for page in 1..=pages {
        let batch = client.list_activities(&access_token, page, per_page)?;
        let received = batch.len();
        info!(page, received, "activity page fetched");

        activities.extend(batch);
        if received < per_page as usize {
            break;
        }
    }
    activities.truncate(limit);

    Ok(activities)
}

/// Access token from the environment, the config file, or the saved token grant.
pub fn resolve_access_token(config: &Config) -> Result<String> {
    if let Some(token) = resolve_secret(ACCESS_TOKEN_ENV, config.strava_access_token.as_deref()) {
        return Ok(token);
    }

    if let Some(token) = tokens::load_saved_access_token(&config.tokens_path)? {
        return Ok(token);
    }

    Err(PipelineError::MalformedCredential {
        service: "Strava",
        reason: format!(
            "no access token configured. Run `pacelab auth`, `pacelab config set strava.access_token <TOKEN>` or set {ACCESS_TOKEN_ENV}"
        ),
    }
    .into())
}

/// Splits the lookback window into a fixed page size and a page count.
pub fn page_plan(lookback: u32) -> (u32, u32) {
    let lookback = lookback.max(1);
    let per_page = lookback.min(MAX_PER_PAGE);
    (per_page, lookback.div_ceil(per_page))
}

#[cfg(test)]
mod tests {
    use super::{ActivityRecord, page_plan};

    #[test]
    fn page_plan_respects_api_page_limit() {
        assert_eq!(page_plan(50), (50, 1));
        assert_eq!(page_plan(200), (200, 1));
        assert_eq!(page_plan(450), (200, 3));
        assert_eq!(page_plan(0), (1, 1));
    }

    #[test]
    fn run_detection_falls_back_to_sport_type() {
        let legacy = ActivityRecord {
            activity_type: Some("Run".to_string()),
            ..ActivityRecord::default()
        };
        let sport_only = ActivityRecord {
            sport_type: Some("Run".to_string()),
            ..ActivityRecord::default()
        };
        let type_wins_over_sport_type = ActivityRecord {
            activity_type: Some("Ride".to_string()),
            sport_type: Some("Run".to_string()),
            ..ActivityRecord::default()
        };

        assert!(legacy.is_run());
        assert!(sport_only.is_run());
        assert!(!type_wins_over_sport_type.is_run());
        assert!(!ActivityRecord::default().is_run());
    }
}
