use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Only acceptable while developing; any other environment must set
/// `APP_AUTH__JWT_SECRET`.
const DEVELOPMENT_JWT_SECRET: &str = "development_secret";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Load the demo users, sections and stocks on startup.
    pub seed: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub password_iterations: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub folder: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_any_origin: bool,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
    pub cors: CorsConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults()?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))

            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        s.try_deserialize::<Self>()?.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.environment != "development" && self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be set in the {} environment",
                self.environment
            )));
        }
        Ok(self)
    }

    /// Settings for tests: in-memory database, cheap password hashing, a
    /// throwaway upload folder. Environment variables are ignored.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::defaults()?
            .set_override("environment", "test")?
            .set_override("database.url", "sqlite::memory:")?
            .set_override("database.max_connections", 1)?
            .set_override("database.seed", false)?
            .set_override("auth.jwt_secret", "test_secret")?
            .set_override("auth.token_expiry_hours", 1)?
            .set_override("auth.password_iterations", 1_000)?
            .set_override(
                "uploads.folder",
                env::temp_dir().join("campus-ledger-test-uploads").to_string_lossy().to_string(),
            )?
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.url", "sqlite://campus_ledger.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.seed", false)?
            .set_default("auth.jwt_secret", DEVELOPMENT_JWT_SECRET)?
            .set_default("auth.token_expiry_hours", 24)?
            .set_default("auth.password_iterations", 600_000)?
            .set_default("uploads.folder", "uploads")?
            .set_default("cors.enabled", true)?
            .set_default("cors.allow_any_origin", false)?
            .set_default("cors.max_age", 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn cleanup_env() {
        env::remove_var("APP_SERVER__PORT");
        env::remove_var("APP_DATABASE__URL");
        env::remove_var("APP_SERVER__WORKERS");
        env::remove_var("APP_AUTH__JWT_SECRET");
        env::remove_var("APP_AUTH__TOKEN_EXPIRY_HOURS");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.workers as usize, num_cpus::get());
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.database.max_connections, 1);
        assert!(!settings.database.seed);
        assert_eq!(settings.auth.password_iterations, 1_000);
        assert!(settings.cors.enabled);
        assert!(!settings.cors.allow_any_origin);
    }

    #[test]
    fn test_environment_override() {
        cleanup_env();

        env::set_var("APP_SERVER__PORT", "9000");
        env::set_var("APP_DATABASE__URL", "sqlite://override.db");
        env::set_var("APP_AUTH__JWT_SECRET", "override_secret");
        env::set_var("APP_AUTH__TOKEN_EXPIRY_HOURS", "48");

        let config = Settings::defaults()
            .expect("Failed to set defaults")
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()
            .expect("Failed to build config")
            .try_deserialize::<Settings>()
            .expect("Failed to deserialize settings");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url, "sqlite://override.db");
        assert_eq!(config.auth.jwt_secret, "override_secret");
        assert_eq!(config.auth.token_expiry_hours, 48);
        assert_eq!(config.auth.password_iterations, 600_000);

        cleanup_env();
    }

    #[test]
    fn test_development_secret_rejected_outside_development() {
        let production = Settings::defaults()
            .and_then(|builder| builder.set_override("environment", "production"))
            .and_then(|builder| builder.build())
            .and_then(|config| config.try_deserialize::<Settings>())
            .expect("Failed to deserialize settings");
        let err = production.validate().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));

        let development = Settings::defaults()
            .and_then(|builder| builder.build())
            .and_then(|config| config.try_deserialize::<Settings>())
            .expect("Failed to deserialize settings");
        assert!(development.validate().is_ok());

        let configured = Settings::defaults()
            .and_then(|builder| builder.set_override("environment", "production"))
            .and_then(|builder| builder.set_override("auth.jwt_secret", "a real secret"))
            .and_then(|builder| builder.build())
            .and_then(|config| config.try_deserialize::<Settings>())
            .expect("Failed to deserialize settings");
        assert!(configured.validate().is_ok());
    }

    #[test]
    fn test_checked_in_config_files() {
        let production = Settings::defaults()
            .and_then(|builder| builder.add_source(File::with_name("config/default")).build())
            .and_then(|config| config.try_deserialize::<Settings>())
            .expect("Failed to load config/default");
        assert_eq!(production.environment, "production");
        assert!(!production.database.seed);

        let development = Settings::defaults()
            .and_then(|builder| {
                builder
                    .add_source(File::with_name("config/default"))
                    .add_source(File::with_name("config/development"))
                    .build()
            })
            .and_then(|config| config.try_deserialize::<Settings>())
            .expect("Failed to load config/development");
        assert_eq!(development.environment, "development");
        assert!(development.database.seed);
    }

    #[test]
    fn test_invalid_port() {
        let result = Settings::defaults()
            .and_then(|builder| builder.set_override("server.port", "invalid"))
            .and_then(|builder| builder.build())
            .and_then(|config| config.try_deserialize::<Settings>());

        assert!(result.is_err(), "Expected error for invalid port");

        if let Err(e) = result {
            let error_message = e.to_string();
            assert!(
                error_message.contains("invalid"),
                "Unexpected error: {}",
                error_message
            );
        }
    }
}
