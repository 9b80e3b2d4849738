use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: String,
        secret_access_key: String,
    },
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// `None` disables summary generation.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub summary: SummaryConfig,
    pub admin_seed: Option<AdminSeed>,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let storage = match optional("STORAGE_BACKEND").as_deref() {
            None | Some("local") => StorageConfig::Local {
                root: PathBuf::from(optional("UPLOADS_DIR").unwrap_or_else(|| "./uploads".into())),
            },
            Some("s3") => StorageConfig::S3 {
                bucket: required("S3_BUCKET")?,
                region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint: optional("S3_ENDPOINT"),
                access_key_id: required("AWS_ACCESS_KEY_ID")?,
                secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let summary = SummaryConfig {
            api_key: optional("OPENAI_API_KEY"),
            base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            model: optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
            timeout: Duration::from_secs(parsed_or("SUMMARY_TIMEOUT_SECS", 60u64)?),
        };

        let admin_seed = match (optional("ADMIN_EMAIL"), optional("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        let cors_origins = optional("CORS_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration_hours: parsed_or("JWT_EXPIRATION_HOURS", 72)?,
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed_or("PORT", 8000)?,
            cors_origins,
            max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            storage,
            summary,
            admin_seed,
        })
    }
}
