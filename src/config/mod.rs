pub mod app;

pub use app::{validate_production_config, AppConfig, ConfigError, SmtpEncryption, SmtpSettings};
