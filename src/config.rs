use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub processor_api_url: String,
    pub processor_api_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    pub checkout_return_url: String,
    pub directory_api_url: String,
    /// Upper bound on the total time spent retrying one outbound call.
    pub http_retry_max: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let processor_api_url = required(&env_map, "PROCESSOR_API_URL")?;
        let processor_api_key = required(&env_map, "PROCESSOR_API_KEY")?;
        let webhook_secret = required(&env_map, "WEBHOOK_SECRET")?;
        let directory_api_url = required(&env_map, "DIRECTORY_API_URL")?;

        let webhook_tolerance_secs = env_map
            .get("WEBHOOK_TOLERANCE_SECS")
            .map(|s| s.as_str())
            .unwrap_or("300")
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "WEBHOOK_TOLERANCE_SECS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let checkout_return_url = env_map
            .get("CHECKOUT_RETURN_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080/checkout/complete".to_string());

        let http_retry_max = env_map
            .get("HTTP_RETRY_MAX_SECS")
            .map(|s| s.as_str())
            .unwrap_or("10")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "HTTP_RETRY_MAX_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            processor_api_url,
            processor_api_key,
            webhook_secret,
            webhook_tolerance_secs,
            checkout_return_url,
            directory_api_url,
            http_retry_max,
        })
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}
