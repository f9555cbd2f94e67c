use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a neutral and concise assistant. \
Summarize the given text clearly and simply, avoiding phrases like 'the user said' or 'the customer is'. \
Do not include introductions, assumptions, or commentary. Just return a brief, clear summary.";

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the outbound chat-completion call.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderSettings,
    /// When set, callers must present it in the `x-api-key` header.
    pub client_api_key: Option<String>,
    pub max_text_length: usize,
    pub summary_dir: PathBuf,
    pub persist_summaries: bool,
    pub static_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        match reqwest::Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(ConfigError::Invalid { key: "OPENAI_BASE_URL", value: base_url }),
        }

        let provider = ProviderSettings {
            api_key,
            base_url,
            model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            temperature: parse_or(&get, "SUMMARY_TEMPERATURE", 0.5)?,
            max_tokens: parse_or(&get, "SUMMARY_MAX_TOKENS", 150)?,
            system_prompt: get("SUMMARY_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            timeout: Duration::from_secs(parse_or(&get, "PROVIDER_TIMEOUT_SECS", 60)?),
        };

        let max_text_length: usize = parse_or(&get, "MAX_TEXT_LENGTH", 10_000)?;
        if max_text_length == 0 {
            return Err(ConfigError::Invalid { key: "MAX_TEXT_LENGTH", value: "0".into() });
        }

        Ok(Self {
            provider,
            client_api_key: get("API_KEY"),
            max_text_length,
            summary_dir: PathBuf::from(get("SUMMARY_DIR").unwrap_or_else(|| "summaries".to_string())),
            persist_summaries: parse_bool_or(&get, "PERSIST_SUMMARIES", true)?,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8000)?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid { key: "HOST", value: raw })
    }
}

/// Settings for the standalone cleanup run; needs no provider key.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub summary_dir: PathBuf,
    pub retention: Duration,
}

impl SweepSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let days: u64 = parse_or(&get, "RETENTION_DAYS", 30)?;
        let secs = days.checked_mul(SECS_PER_DAY).ok_or_else(|| ConfigError::Invalid {
            key: "RETENTION_DAYS",
            value: days.to_string(),
        })?;
        Ok(Self {
            summary_dir: PathBuf::from(get("SUMMARY_DIR").unwrap_or_else(|| "summaries".to_string())),
            retention: Duration::from_secs(secs),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else { return Ok(default) };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}
