use std::{env, net::IpAddr, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use tracing::warn;

use crate::services::password_service::HashCost;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpEncryption {
    Tls,
    StartTls,
    None,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub encryption: SmtpEncryption,
}

impl SmtpSettings {
    /// `None` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = env::var("SMTP_HOST") else {
            return Ok(None);
        };

        let port = parse_var("SMTP_PORT", 587u16)?;
        let username = env::var("SMTP_USERNAME").map_err(|_| ConfigError::Missing("SMTP_USERNAME"))?;
        let password = env::var("SMTP_PASSWORD").map_err(|_| ConfigError::Missing("SMTP_PASSWORD"))?;
        let from_email =
            env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| username.clone());
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "DoGether".to_string());

        let encryption = match env::var("SMTP_ENCRYPTION")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_lowercase()
            .as_str()
        {
            "tls" => SmtpEncryption::Tls,
            "starttls" => SmtpEncryption::StartTls,
            "none" => SmtpEncryption::None,
            other => {
                return Err(ConfigError::Invalid {
                    key: "SMTP_ENCRYPTION",
                    value: other.to_string(),
                })
            }
        };

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            from_name,
            encryption,
        }))
    }
}

/// Process-wide settings, read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub frontend_url: String,
    /// Base of the links mailed to users: `{public_base_url}/verify-email?token=...`.
    pub public_base_url: String,
    pub request_timeout: Duration,
    pub hash_cost: HashCost,
    pub jwt_secret: Vec<u8>,
    pub smtp: Option<SmtpSettings>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = current_environment();
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let host = parse_var("HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_var("PORT", 5000u16)?;

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| frontend_url.clone());

        let request_timeout = Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", 30u64)?);

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_var("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            environment,
            database_url,
            host,
            port,
            frontend_url,
            public_base_url,
            request_timeout,
            hash_cost,
            jwt_secret: load_jwt_secret(),
            smtp: SmtpSettings::from_env()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("frontend_url", &self.frontend_url)
            .field("public_base_url", &self.public_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("hash_cost", &self.hash_cost)
            .field("smtp_host", &self.smtp.as_ref().map(|s| s.host.as_str()))
            .finish_non_exhaustive()
    }
}

/// Refuses to start a production process with a missing or weak signing key.
pub fn validate_production_config() {
    if current_environment() != "production" {
        return;
    }

    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set in production");
    let decoded_secret = decode_secret_bytes(&secret);

    if decoded_secret.len() < 32 {
        panic!("FATAL: JWT_SECRET must be at least 32 bytes in production");
    }

    let lowered = secret.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        panic!("FATAL: JWT_SECRET appears to be a default value. Generate a secure secret!");
    }
}

fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn load_jwt_secret() -> Vec<u8> {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => decode_secret_bytes(&secret),
        _ => {
            warn!("JWT_SECRET not set; generating ephemeral signing key (development only)");
            let mut key = vec![0u8; 64];
            rand::thread_rng().fill_bytes(&mut key);
            key
        }
    }
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}
