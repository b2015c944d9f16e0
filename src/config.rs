use std::env;

use anyhow::{anyhow, Result};

/// Default model identifier. Selects which classification model the service
/// talks to and is the default echoed `model` string in batch responses.
pub const DEFAULT_MODEL: &str = "fossistant-v0.1.0";

const DEFAULT_MODEL_URL: &str = "http://127.0.0.1:8500/predict";
const DEFAULT_MODEL_TIMEOUT_MS: u64 = 5_000;

/// Startup configuration snapshot.
///
/// The valid API key set is deliberately absent here: `VALID_API_KEYS` is
/// re-read on every request through `auth::EnvCredentials` so operator edits
/// take effect without a restart.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_name: String,
    pub model_url: String,
    pub model_timeout_ms: u64,
    pub max_request_bytes: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let model_name = non_empty_var("FOSSISTANT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let model_url =
            non_empty_var("FOSSISTANT_MODEL_URL").unwrap_or_else(|| DEFAULT_MODEL_URL.into());
        let model_timeout_ms =
            parse_optional_u64("FOSSISTANT_MODEL_TIMEOUT_MS")?.unwrap_or(DEFAULT_MODEL_TIMEOUT_MS);
        let max_request_bytes =
            parse_optional_u64("FOSSISTANT_MAX_REQUEST_BYTES")?.map(|v| v as usize);

        Ok(Self {
            model_name,
            model_url,
            model_timeout_ms,
            max_request_bytes,
        })
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|s| !s.trim().is_empty())
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
