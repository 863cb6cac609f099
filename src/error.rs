use thiserror::Error;

/// Failure conditions the pipeline reports as distinct cases.
///
/// I/O plumbing still goes through `anyhow`; these are the conditions a
/// caller may want to match on (skip the coach, abort the fetch, explain
/// that more weeks are needed).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{service} API error {status}: {body}")]
    UpstreamApi {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request timed out after {seconds}s")]
    Timeout { service: &'static str, seconds: u64 },

    #[error("invalid {service} credential: {reason}")]
    MalformedCredential {
        service: &'static str,
        reason: String,
    },

    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    #[error("insufficient data for {stage}: need at least {needed}, got {got}")]
    InsufficientData {
        stage: &'static str,
        needed: usize,
        got: usize,
    },
}

impl PipelineError {
    pub fn from_http(
        service: &'static str,
        timeout_seconds: u64,
        error: reqwest::Error,
    ) -> anyhow::Error {
        if error.is_timeout() {
            Self::Timeout {
                service,
                seconds: timeout_seconds,
            }
            .into()
        } else {
            anyhow::Error::new(error).context(format!("{service} API request failed"))
        }
    }
}

/// Passes a response body through when the status is 2xx.
pub fn ensure_success(
    service: &'static str,
    status: reqwest::StatusCode,
    body: String,
) -> Result<String, PipelineError> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(PipelineError::UpstreamApi {
            service,
            status: status.as_u16(),
            body,
        })
    }
}
