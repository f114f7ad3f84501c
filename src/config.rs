use std::env;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_PROOF_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    /// Bearer token from the persisted session; absent means "not signed in".
    pub access_token: Option<String>,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub proof_max_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("CLINIC_API_BASE_URL")?;
        let access_token = env::var("CLINIC_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());
        let poll_interval_secs = env::var("PAYMENT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let poll_max_attempts = env::var("PAYMENT_POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS);
        let proof_max_bytes = env::var("GCASH_PROOF_MAX_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PROOF_MAX_BYTES);

        Ok(Self {
            api_base_url,
            access_token,
            poll_interval: Duration::from_secs(poll_interval_secs),
            poll_max_attempts,
            proof_max_bytes,
        })
    }

    /// Defaults for everything except the base URL; used by tests and by
    /// frontends that manage their own settings store.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            access_token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            proof_max_bytes: DEFAULT_PROOF_MAX_BYTES,
        }
    }
}
