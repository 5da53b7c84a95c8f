use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ADJUST_REASON: &str = "Quantity adjustment";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (postgres:// or sqlite://)
    pub database_url: String,

    /// Shared secret used to verify HS256 session tokens (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Expected `iss` claim on session tokens
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Expected `aud` claim on session tokens
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Signing secret of the identity provider's webhook endpoint (`whsec_...`)
    #[serde(default)]
    pub clerk_webhook_secret: Option<String>,

    /// Maximum age of a webhook timestamp, in seconds
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,

    /// Reason recorded when a quantity adjustment carries none
    #[serde(default = "default_adjust_reason")]
    #[validate(length(min = 1, max = 200))]
    pub default_adjust_reason: String,

    /// How many times the ledger recomputes after losing a compare-and-set
    #[serde(default = "default_ledger_max_retries")]
    #[validate(range(min = 1, max = 20))]
    pub ledger_max_retries: u32,

    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u64,

    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u64,
}

impl AppConfig {
    /// Creates a new configuration
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: default_jwt_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            clerk_webhook_secret: None,
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            default_adjust_reason: default_adjust_reason(),
            ledger_max_retries: default_ledger_max_retries(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.webhook_tolerance_secs)
    }

    /// Cross-field rules that the derive cannot express.
    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            errors.add(
                "cors_allowed_origins",
                config_error(
                    "cors_allowed_origins_required",
                    "Set APP__CORS_ALLOWED_ORIGINS outside development, or opt in with APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                config_error(
                    "jwt_secret_default_dev",
                    "The bundled development JWT secret is only allowed in development",
                ),
            );
        }
        if self.is_production() && self.clerk_webhook_secret.is_none() {
            errors.add(
                "clerk_webhook_secret",
                config_error(
                    "clerk_webhook_secret_required",
                    "Set APP__CLERK_WEBHOOK_SECRET so identity webhooks can be verified",
                ),
            );
        }
        if self.api_default_page_size == 0 || self.api_default_page_size > self.api_max_page_size {
            errors.add(
                "api_default_page_size",
                config_error(
                    "api_default_page_size",
                    "api_default_page_size must be between 1 and api_max_page_size",
                ),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_jwt_issuer() -> String {
    "pizza-pantry".to_string()
}

fn default_jwt_audience() -> String {
    "pizza-pantry-api".to_string()
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

fn default_adjust_reason() -> String {
    DEFAULT_ADJUST_REASON.to_string()
}

fn default_ledger_max_retries() -> u32 {
    5
}

fn default_api_page_size() -> u64 {
    50
}

fn default_api_max_page_size() -> u64 {
    100
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    level
        .parse::<tracing::Level>()
        .map(|_| ())
        .map_err(|_| config_error("log_level", "Must be one of: trace, debug, info, warn, error"))
}

/// HS256 needs a long, varied secret; short or low-entropy values are refused.
fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const MIN_LEN: usize = 64;
    const MIN_DISTINCT: usize = 10;

    let trimmed = secret.trim();
    if trimmed.len() < MIN_LEN {
        return Err(config_error(
            "jwt_secret",
            "JWT secret must be at least 64 characters",
        ));
    }
    let distinct: std::collections::BTreeSet<char> = trimmed.chars().collect();
    if distinct.len() < MIN_DISTINCT {
        return Err(config_error(
            "jwt_secret",
            "JWT secret must contain at least 10 distinct characters",
        ));
    }
    Ok(())
}

fn config_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Initializes tracing using the provided log level as the default filter.
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("pizza_pantry={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("database_url", "sqlite://pizza_pantry.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str =
        "k3J9xq2LmP8vR4tY7wZ1aB6cD0eF5gH-iJ_uK9lM2nO4pQ7rS1tU3vW6xY8zA0bC";

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://pantry.db?mode=memory".into(),
            STRONG_SECRET.into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.default_adjust_reason, "Quantity adjustment");
        assert_eq!(cfg.webhook_tolerance(), Duration::from_secs(300));
    }

    #[test]
    fn production_requires_cors_origins_and_webhook_secret() {
        let cfg = base_config();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("cors_allowed_origins"));
        assert!(fields.contains_key("clerk_webhook_secret"));
    }

    #[test]
    fn production_with_origins_and_secret_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://pantry.example.com".into());
        cfg.clerk_webhook_secret = Some("whsec_c2VjcmV0".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn dev_secret_rejected_outside_development() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        cfg.clerk_webhook_secret = Some("whsec_c2VjcmV0".into());
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn weak_jwt_secret_fails_validation() {
        let mut cfg = base_config();
        cfg.jwt_secret = "a".repeat(80);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ledger_retry_bounds_are_enforced() {
        let mut cfg = base_config();
        cfg.ledger_max_retries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }
}
