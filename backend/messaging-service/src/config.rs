use crate::error::AppError;
use db_pool::env_utils::{parse_env_optional, parse_env_or, require_env};
use db_pool::DbConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const SERVICE_NAME: &str = "messaging-service";
const MIN_JWT_SECRET_LEN: usize = 16;
const MAX_NOTIFICATION_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub notifications: NotificationConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Present only for the postgres backend
    pub database: Option<DbConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct RedisConfig {
    /// Enables the cross-instance relay when set
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub leeway_secs: u64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub ttl_days: i64,
    pub sweep_interval_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_days: crate::models::notification::DEFAULT_TTL_DAYS,
            sweep_interval_secs: 300,
        }
    }
}

impl NotificationConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 5,
            client_timeout_secs: 30,
        }
    }
}

impl WebSocketConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self::read_env().map_err(AppError::Config)?;
        config.validate().map_err(AppError::Config)?;
        Ok(config)
    }

    fn read_env() -> Result<Self, String> {
        let backend: StorageBackend = parse_env_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database = match backend {
            StorageBackend::Postgres => Some(DbConfig::from_env(SERVICE_NAME)?),
            StorageBackend::Memory => None,
        };

        Ok(Config {
            app: AppConfig {
                env: parse_env_or("APP_ENV", "development".to_string())?,
                host: parse_env_or("APP_HOST", "0.0.0.0".to_string())?,
                port: parse_env_or("APP_PORT", 8080)?,
            },
            storage: StorageConfig { backend, database },
            redis: RedisConfig {
                url: parse_env_optional("REDIS_URL")?,
            },
            auth: AuthConfig {
                jwt_secret: require_env("JWT_SECRET")?,
                leeway_secs: parse_env_or("JWT_LEEWAY_SECS", 30)?,
            },
            notifications: NotificationConfig {
                ttl_days: parse_env_or("NOTIFICATION_TTL_DAYS", 30)?,
                sweep_interval_secs: parse_env_or("NOTIFICATION_SWEEP_INTERVAL_SECS", 300)?,
            },
            websocket: WebSocketConfig {
                heartbeat_interval_secs: parse_env_or("WS_HEARTBEAT_INTERVAL_SECS", 5)?,
                client_timeout_secs: parse_env_or("WS_CLIENT_TIMEOUT_SECS", 30)?,
            },
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes"
            ));
        }
        if !(1..=MAX_NOTIFICATION_TTL_DAYS).contains(&self.notifications.ttl_days) {
            return Err(format!(
                "NOTIFICATION_TTL_DAYS must be between 1 and {MAX_NOTIFICATION_TTL_DAYS}"
            ));
        }
        if self.notifications.sweep_interval_secs == 0 {
            return Err("NOTIFICATION_SWEEP_INTERVAL_SECS must be positive".to_string());
        }
        if self.websocket.heartbeat_interval_secs == 0
            || self.websocket.heartbeat_interval_secs >= self.websocket.client_timeout_secs
        {
            return Err(
                "WS_HEARTBEAT_INTERVAL_SECS must be positive and below WS_CLIENT_TIMEOUT_SECS"
                    .to_string(),
            );
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.app.host.clone(), self.app.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "STORAGE_BACKEND",
        "JWT_SECRET",
        "APP_PORT",
        "REDIS_URL",
        "NOTIFICATION_TTL_DAYS",
        "WS_HEARTBEAT_INTERVAL_SECS",
        "WS_CLIENT_TIMEOUT_SECS",
        "DATABASE_URL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_memory_backend_defaults() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef");

        let config = Config::from_env().unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.database.is_none());
        assert_eq!(config.app.port, 8080);
        assert!(config.redis.url.is_none());
        assert_eq!(config.notifications.ttl_days, 30);
        assert_eq!(config.websocket.client_timeout(), Duration::from_secs(30));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_short_secret_is_rejected() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", "short");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_numbers_are_errors() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef");
        std::env::set_var("APP_PORT", "http");
        assert!(Config::from_env().is_err());

        std::env::remove_var("APP_PORT");
        std::env::set_var("WS_HEARTBEAT_INTERVAL_SECS", "60");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_notification_ttl_is_bounded() {
        clear_env();
        std::env::set_var("STORAGE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", "0123456789abcdef");
        std::env::set_var("NOTIFICATION_TTL_DAYS", "0");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));

        std::env::set_var("NOTIFICATION_TTL_DAYS", "9223372036854775807");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));

        std::env::set_var("NOTIFICATION_TTL_DAYS", "3650");
        assert_eq!(Config::from_env().unwrap().notifications.ttl_days, 3650);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_postgres_backend_requires_database_url() {
        clear_env();
        std::env::set_var("JWT_SECRET", "0123456789abcdef");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let auth = AuthConfig {
            jwt_secret: "super-secret-value".to_string(),
            leeway_secs: 30,
        };
        assert!(!format!("{auth:?}").contains("super-secret-value"));
    }
}
