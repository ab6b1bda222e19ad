use anyhow::{anyhow, bail, Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::relay::{AllowedOrigins, ErrorPolicy};

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3-8b-instruct";
pub const DEFAULT_PORT: u16 = 10000;
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream: UpstreamSettings,
    pub host: IpAddr,
    pub port: u16,
    pub allowed_origins: AllowedOrigins,
    pub error_policy: ErrorPolicy,
    pub system_prompt_file: Option<PathBuf>,
}

/// Everything the completion client needs to reach the provider.
#[derive(Clone)]
pub struct UpstreamSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub referer: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl std::fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = var(API_KEY_ENV_VAR)
            .ok_or_else(|| anyhow!("{} must be set (environment or .env file)", API_KEY_ENV_VAR))?;

        let port = parse_or(var("PORT"), "PORT", DEFAULT_PORT)?;
        let host = parse_or(var("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let timeout_secs: u64 = parse_or(var("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            bail!("UPSTREAM_TIMEOUT_SECS must be greater than zero");
        }
        let max_retries = parse_or(var("UPSTREAM_MAX_RETRIES"), "UPSTREAM_MAX_RETRIES", 2)?;

        let error_policy = match var("ERROR_POLICY") {
            Some(value) => value.parse()?,
            None => ErrorPolicy::default(),
        };

        let allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
            Some(value) => value.parse()?,
            None => AllowedOrigins::Any,
        };

        let upstream = UpstreamSettings {
            api_key,
            api_url: var("OPENROUTER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: var("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            referer: var("HTTP_REFERER").unwrap_or_else(|| format!("http://localhost:{}", port)),
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
        };

        Ok(Self {
            upstream,
            host,
            port,
            allowed_origins,
            error_policy,
            system_prompt_file: var("SYSTEM_PROMPT_FILE").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
