use std::env;

use anyhow::{anyhow, Result};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOTAL: usize = 10;

pub const ENV_BASE_URL: &str = "HNSTORIES_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "HNSTORIES_TIMEOUT_SECS";
pub const ENV_MAX_PARALLEL: &str = "HNSTORIES_MAX_PARALLEL";

/// Knobs for one fan-out orchestration call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutOptions {
    /// Ceiling on concurrent fetches. `None` means one task per identifier.
    pub max_parallel: Option<usize>,
    /// Skip not-yet-started fetches once any fetch has failed.
    pub cancel_on_failure: bool,
    /// Only the first `limit` listed identifiers are fetched. Applied by
    /// `orchestrator::fetch_all` after listing; `fan_out` and `fetch_ids` fetch
    /// whatever they are given.
    pub limit: Option<usize>,
}

impl FanoutOptions {
    /// Defaults, with `max_parallel` taken from `HNSTORIES_MAX_PARALLEL` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_env_or(None)
    }

    /// Like `from_env`, but an explicit `max_parallel` wins and the env var is
    /// not consulted at all.
    pub fn from_env_or(max_parallel: Option<usize>) -> Result<Self> {
        let max_parallel = match max_parallel {
            Some(v) => Some(v),
            None => env_positive(ENV_MAX_PARALLEL)?.map(|v| v as usize),
        };
        Ok(Self {
            max_parallel,
            ..Self::default()
        })
    }
}

/// Settings for the Hacker News collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HnConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HnConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HnConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_env_or(None, None)
    }

    /// Explicit values win; the matching env var is only read when one is absent.
    pub fn from_env_or(base_url: Option<String>, timeout_secs: Option<u64>) -> Result<Self> {
        let base_url = match base_url {
            Some(v) => v,
            None => match env::var(ENV_BASE_URL) {
                Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
                _ => DEFAULT_BASE_URL.to_string(),
            },
        };
        let timeout_secs = match timeout_secs {
            Some(v) => v,
            None => env_positive(ENV_TIMEOUT_SECS)?.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        Ok(Self {
            base_url,
            timeout_secs,
        })
    }
}

/// Read an optional positive integer from the environment.
fn env_positive(key: &str) -> Result<Option<u64>> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    parse_positive(key, &raw).map(Some)
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    let parsed: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid {key}: '{raw}' (must be a positive integer)"))?;
    if parsed == 0 {
        return Err(anyhow!("invalid {key}: '{raw}' (must be a positive integer)"));
    }
    Ok(parsed)
}
