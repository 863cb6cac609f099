use crate::collector::ActivityRecord;
use crate::config::Config;
use crate::error::{PipelineError, ensure_success};
use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const API_SERVICE: &str = "Strava";
const OAUTH_SERVICE: &str = "Strava OAuth";

/// Blocking Strava client. Every request carries the configured timeout.
pub struct StravaClient {
    http: Client,
    api_base_url: String,
    oauth_url: String,
    timeout_seconds: u64,
}

/// Successful authorization-code exchange. `raw` is the response body as sent.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub raw: Value,
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenGrant {
    /// Last four characters of the access token, for confirmation output.
    pub fn access_token_hint(&self) -> String {
        let chars = self.access_token.chars().collect::<Vec<_>>();
        let tail = chars[chars.len().saturating_sub(4)..].iter().collect::<String>();
        format!("...{tail}")
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}

impl StravaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let timeout_seconds = config.http_timeout_seconds.max(5);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create Strava HTTP client")?;

        Ok(Self {
            http,
            api_base_url: config.strava_api_base_url.clone(),
            oauth_url: config.strava_oauth_url.clone(),
            timeout_seconds,
        })
    }

    pub fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ActivityRecord>> {
        validate_bearer(access_token)?;
        let endpoint = join_endpoint(&self.api_base_url, "athlete/activities")?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .query(&[("per_page", per_page.to_string()), ("page", page.to_string())])
            .send()
            .map_err(|error| PipelineError::from_http(API_SERVICE, self.timeout_seconds, error))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| PipelineError::from_http(API_SERVICE, self.timeout_seconds, error))?;
        let body = ensure_success(API_SERVICE, status, body)?;

        parse_activities(&body)
    }

    pub fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<TokenGrant> {
        let endpoint = Url::parse(&self.oauth_url)
            .with_context(|| format!("Invalid Strava OAuth URL: {}", self.oauth_url))?;

        let response = self
            .http
            .post(endpoint)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .map_err(|error| {
                PipelineError::from_http(OAUTH_SERVICE, self.timeout_seconds, error)
            })?;

        let status = response.status();
        let body = response.text().map_err(|error| {
            PipelineError::from_http(OAUTH_SERVICE, self.timeout_seconds, error)
        })?;
        let body = ensure_success(OAUTH_SERVICE, status, body)?;

        parse_token_grant(&body)
    }
}

pub fn parse_activities(body: &str) -> Result<Vec<ActivityRecord>> {
    serde_json::from_str(body).with_context(|| {
        format!(
            "Failed to parse Strava activities response: {}",
            truncate(body, 200)
        )
    })
}

pub fn parse_token_grant(body: &str) -> Result<TokenGrant> {
    let raw: Value = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse Strava token response: {}", truncate(body, 200)))?;

    let field = |name: &str| {
        raw.get(name)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("Strava token response is missing `{name}`"))
    };
    let access_token = field("access_token")?;
    let refresh_token = field("refresh_token")?;

    Ok(TokenGrant {
        raw,
        access_token,
        refresh_token,
    })
}

fn validate_bearer(access_token: &str) -> Result<(), PipelineError> {
    if access_token.trim().is_empty() {
        return Err(PipelineError::MalformedCredential {
            service: API_SERVICE,
            reason: "access token is empty".to_string(),
        });
    }

    HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map(|_| ())
        .map_err(|_| PipelineError::MalformedCredential {
            service: API_SERVICE,
            reason: "access token contains characters not allowed in a header".to_string(),
        })
}

pub fn join_endpoint(base_url: &str, path: &str) -> Result<Url> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|url| url.join(path))
        .with_context(|| format!("Invalid API base URL: {base_url}"))
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
