//! Environment configuration.

use std::env;
use std::time::Duration;

use dify_api::{
    normalize_base_url, Credentials, DifyApiConfig, ResponseMode, DEFAULT_KNOWLEDGE_BASE_URL,
};
use tracing::warn;

pub const ENV_CHAT_URL: &str = "DIFY_API_URL";
pub const ENV_CHAT_KEY: &str = "DIFY_API_KEY";
pub const ENV_KNOWLEDGE_URL: &str = "DIFY_KNOWLEDGE_API_URL";
pub const ENV_KNOWLEDGE_KEY: &str = "DIFY_KNOWLEDGE_API_KEY";
pub const ENV_DATASET_ID: &str = "DIFY_DATASETS_ID";
pub const ENV_CONVERSION_URL: &str = "DIFY_MD_API_URL";
pub const ENV_CONVERSION_KEY: &str = "DIFY_MD_API_KEY";
pub const ENV_RESPONSE_MODE: &str = "DIFY_RESPONSE_MODE";
pub const ENV_TIMEOUT_SECS: &str = "DIFY_TIMEOUT_SECS";

/// Deployment settings read once at startup. Blank variables count as unset.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub chat_url: Option<String>,
    pub chat_key: Option<String>,
    pub knowledge_url: String,
    pub knowledge_key: Option<String>,
    pub dataset_id: Option<String>,
    pub conversion_url: Option<String>,
    pub conversion_key: Option<String>,
    pub response_mode: ResponseMode,
    pub timeout: Option<Duration>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            chat_url: env_url_opt(ENV_CHAT_URL),
            chat_key: env_string_opt(ENV_CHAT_KEY),
            knowledge_url: env_url_opt(ENV_KNOWLEDGE_URL)
                .unwrap_or_else(|| DEFAULT_KNOWLEDGE_BASE_URL.to_owned()),
            knowledge_key: env_string_opt(ENV_KNOWLEDGE_KEY),
            dataset_id: env_string_opt(ENV_DATASET_ID),
            conversion_url: env_url_opt(ENV_CONVERSION_URL),
            conversion_key: env_string_opt(ENV_CONVERSION_KEY),
            response_mode: env_response_mode(),
            timeout: env_timeout(),
        }
    }

    /// Transport configuration. A family appears once any of its variables is
    /// set, so a half-configured family fails with the missing field's name.
    pub fn api_config(&self) -> DifyApiConfig {
        let mut config = DifyApiConfig::new();
        config.chat = credentials(self.chat_url.as_deref(), self.chat_key.as_deref());
        config.knowledge = Some(Credentials::new(
            self.knowledge_url.clone(),
            self.knowledge_key.clone().unwrap_or_default(),
        ));
        config.conversion =
            credentials(self.conversion_url.as_deref(), self.conversion_key.as_deref());
        config.dataset_id = self.dataset_id.clone();
        config.timeout = self.timeout;
        config
    }
}

fn credentials(url: Option<&str>, key: Option<&str>) -> Option<Credentials> {
    if url.is_none() && key.is_none() {
        return None;
    }
    Some(Credentials::new(
        url.unwrap_or_default(),
        key.unwrap_or_default(),
    ))
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_owned())
        }
    })
}

fn env_url_opt(key: &str) -> Option<String> {
    env_string_opt(key)
        .map(|value| normalize_base_url(&value))
        .filter(|value| !value.is_empty())
}

fn env_response_mode() -> ResponseMode {
    let Some(value) = env_string_opt(ENV_RESPONSE_MODE) else {
        return ResponseMode::default();
    };
    ResponseMode::parse(&value).unwrap_or_else(|| {
        warn!(value = %value, "unknown {ENV_RESPONSE_MODE}; using streaming");
        ResponseMode::default()
    })
}

fn env_timeout() -> Option<Duration> {
    let value = env_string_opt(ENV_TIMEOUT_SECS)?;
    match value.parse::<u64>() {
        Ok(0) => None,
        Ok(seconds) => Some(Duration::from_secs(seconds)),
        Err(_) => {
            warn!(value = %value, "ignoring non-numeric {ENV_TIMEOUT_SECS}");
            None
        }
    }
}
