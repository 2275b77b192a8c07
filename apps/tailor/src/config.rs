use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_MODEL;

/// Upper bound for `MAX_MODEL_ATTEMPTS`.
pub const MAX_MODEL_ATTEMPTS_LIMIT: u32 = 10;

/// Application configuration loaded from environment variables.
/// Everything has a default; only malformed or out-of-range numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub template_dir: String,
    pub output_dir: String,
    pub anthropic_api_key: Option<String>,
    /// Base64-obscured key, used when `ANTHROPIC_API_KEY` is absent.
    pub anthropic_api_key_b64: Option<String>,
    pub model: String,
    pub max_output_tokens: u32,
    pub model_timeout: Duration,
    pub compile_timeout: Duration,
    pub max_model_attempts: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            template_dir: env_or("TEMPLATE_DIR", "resume_templates"),
            output_dir: env_or("OUTPUT_DIR", "output"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_api_key_b64: optional_env("ANTHROPIC_API_KEY_B64"),
            model: env_or("MODEL", DEFAULT_MODEL),
            max_output_tokens: parse_env("MAX_OUTPUT_TOKENS", 4000)?,
            model_timeout: Duration::from_secs(parse_env("MODEL_TIMEOUT_SECS", 120)?),
            compile_timeout: Duration::from_secs(parse_env("COMPILE_TIMEOUT_SECS", 60)?),
            max_model_attempts: model_attempts(parse_env("MAX_MODEL_ATTEMPTS", 3)?)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn model_attempts(value: u32) -> Result<u32> {
    if !(1..=MAX_MODEL_ATTEMPTS_LIMIT).contains(&value) {
        bail!("MAX_MODEL_ATTEMPTS must be between 1 and {MAX_MODEL_ATTEMPTS_LIMIT}, got {value}");
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Unset and blank are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
