use std::collections::HashMap;
use std::fmt;
use derive_more::Display;
use serde::Deserialize;
use tokio::fs;

pub const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const SPREADSHEET_ID_VAR: &str = "SPREADSHEET_ID";
pub const CREDENTIALS_VAR: &str = "GOOGLE_CREDENTIALS";
pub const CREDENTIALS_FILE_VAR: &str = "GOOGLE_CREDENTIALS_FILE";

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "Environment variable {} not set", _0)]
    MissingVariable(String),
    #[display(fmt = "Failed to read {} with exception: {}", _0, _1)]
    Read(String, std::io::Error),
    #[display(fmt = "Failed to deserialize {} with exception: {}", _0, _1)]
    Deserialize(String, serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Telegram account id -> sheet name.
    pub partitions: HashMap<i64, String>,
    #[serde(default)]
    pub lock_stripes: u16,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Externally reachable URL registered with Telegram.
    pub public_url: String,
    #[serde(default)]
    pub secret_token: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_timeout() -> u32 {
    30
}

fn default_request_timeout() -> u64 {
    60
}

impl ApplicationConfig {
    pub fn from_json(name: &str, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Deserialize(name.to_string(), e))
    }

    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_string(), e))?;
        Self::from_json(path, &content)
    }
}

/// Settings that never live in the config file.
pub struct Secrets {
    pub bot_token: String,
    pub spreadsheet_id: String,
    /// Raw service account key JSON.
    pub credentials: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &"<redacted>")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub async fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok()).await
    }

    pub async fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
        };
        let bot_token = required(BOT_TOKEN_VAR)?;
        let spreadsheet_id = required(SPREADSHEET_ID_VAR)?;
        let credentials = match required(CREDENTIALS_VAR) {
            Ok(inline) => inline,
            Err(_) => {
                let path = required(CREDENTIALS_FILE_VAR).map_err(|_| {
                    ConfigError::MissingVariable(format!("{CREDENTIALS_VAR} or {CREDENTIALS_FILE_VAR}"))
                })?;
                fs::read_to_string(&path)
                    .await
                    .map_err(|e| ConfigError::Read(path.clone(), e))?
            }
        };
        Ok(Secrets {
            bot_token,
            spreadsheet_id,
            credentials,
        })
    }
}
