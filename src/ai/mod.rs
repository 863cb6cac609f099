use crate::config::{Config, resolve_secret};
use crate::error::{PipelineError, ensure_success};
use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const API_KEY_ENV: &str = "PACELAB_AI_API_KEY";
const SERVICE: &str = "AI";

const COACH_PROMPT: &str = r#"You are an elite running coach and sports scientist. Your athlete is a beginner runner and the JSON below is a statistical analysis of their recent training history.

How to read the data:
- Pace is in minutes per kilometre, so a lower number is faster.
- "avg_pace_change_vs_prev_period" is the average change in weekly pace. A NEGATIVE value means the runner got FASTER.
- The correlations compare the number of speed/interval or easy/recovery runs in a week with the pace change from that week to the following week. A NEGATIVE correlation means more of that workout type is followed by getting faster. "undefined" means there was not enough weekly data.
- The pace zones are personal: runs at or below q1 are speed work, runs at or above q3 are easy.

Write the answer in three short sections:
1. Diagnosis: what the numbers say about the current training mix.
2. Recommendation: a concrete adjustment for the next two weeks, using the runner's own pace zones.
3. Caution: one injury-prevention or recovery note suited to a beginner.

Keep it under 250 words and do not invent numbers that are not in the data."#;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Asks the model for coaching advice on a serialized analysis summary.
pub fn coach_recommendation(config: &Config, summary_json: &str) -> Result<String> {
    let api_key = resolve_api_key(config).ok_or_else(|| PipelineError::MalformedCredential {
        service: SERVICE,
        reason: format!(
            "API key is missing. Set `pacelab config set ai.api_key <KEY>` or `{API_KEY_ENV}`."
        ),
    })?;

    chat_completion(config, &api_key, COACH_PROMPT, &coach_user_prompt(summary_json))
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = resolve_api_key(config).with_context(|| {
        format!("AI API key is missing. Set `pacelab config set ai.api_key <KEY>` or `{API_KEY_ENV}`.")
    })?;

    let system_prompt = "Return exactly one short sentence confirming the AI API is reachable.";
    let user_prompt = "Health check for PaceLab.";

    chat_completion(config, &api_key, system_prompt, user_prompt)
}

pub fn has_api_key(config: &Config) -> bool {
    resolve_api_key(config).is_some()
}

fn resolve_api_key(config: &Config) -> Option<String> {
    resolve_secret(API_KEY_ENV, config.ai_api_key.as_deref())
}

fn coach_user_prompt(summary_json: &str) -> String {
    format!("[ANALYSIS DATA JSON]:\n{summary_json}")
}

fn chat_completion(config: &Config, api_key: &str, system: &str, user: &str) -> Result<String> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(PipelineError::MalformedCredential {
            service: SERVICE,
            reason: "API key is empty".to_string(),
        }
        .into());
    }

    let timeout_seconds = config.ai_timeout_seconds.max(5);
    let endpoint = format!(
        "{}/chat/completions",
        config.ai_api_base_url.trim_end_matches('/')
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            PipelineError::MalformedCredential {
                service: SERVICE,
                reason: "API key contains characters not allowed in a header".to_string(),
            }
        })?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": config.ai_model,
        "temperature": 0.4,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ]
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .map_err(|error| PipelineError::from_http(SERVICE, timeout_seconds, error))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|error| PipelineError::from_http(SERVICE, timeout_seconds, error))?;
    let body = ensure_success(SERVICE, status, body)?;

    parse_completion(&body)
}

fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    parsed
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("AI response did not include message.content"))
}
