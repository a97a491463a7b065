//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheSettings;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "nimbus";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_LIVENESS_INTERVAL_SECS: u64 = 30;
const DEFAULT_SESSION_RETENTION_SECS: u64 = 1800;
const DEFAULT_RETENTION_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_TRANSITION_DELAY_SECS: u64 = 3;

/// Command-line arguments for the nimbus binary.
#[derive(Debug, Parser, Default)]
#[command(name = "nimbus", version, about = "Cloud-PC management backend")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NIMBUS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis cache URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the token signing secret.
    #[arg(long = "auth-signing-secret", value_name = "SECRET")]
    pub auth_signing_secret: Option<String>,

    /// Override the simulated lifecycle transition delay in seconds.
    #[arg(long = "lifecycle-transition-delay-seconds", value_name = "SECONDS")]
    pub transition_delay_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and
/// validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    pub websocket: WebSocketSettings,
    pub lifecycle: LifecycleSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub signing_secret: Option<String>,
    pub token_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    pub liveness_interval: Duration,
    pub session_retention: Duration,
    pub retention_sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub transition_delay: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("NIMBUS").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli_overrides(cli);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
    websocket: RawWebSocketSettings,
    lifecycle: RawLifecycleSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    redis_url: Option<String>,
    warmup_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    signing_secret: Option<String>,
    token_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWebSocketSettings {
    liveness_interval_seconds: Option<u64>,
    session_retention_seconds: Option<u64>,
    retention_sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLifecycleSettings {
    transition_delay_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(host) = cli.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = cli.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = cli.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = cli.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = cli.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(secret) = cli.auth_signing_secret.as_ref() {
            self.auth.signing_secret = Some(secret.clone());
        }
        if let Some(delay) = cli.transition_delay_seconds {
            self.lifecycle.transition_delay_seconds = Some(delay);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let host = raw
            .server
            .host
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = raw.server.port.unwrap_or(DEFAULT_PORT);
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;

        let level_text = raw.logging.level.unwrap_or_else(|| "info".to_string());
        let level = LevelFilter::from_str(&level_text)
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?;
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let max_connections = raw
            .database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let max_connections = NonZeroU32::new(max_connections)
            .ok_or_else(|| LoadError::invalid("database.max_connections", "must be non-zero"))?;

        let cache_defaults = CacheSettings::default();
        let cache = CacheSettings {
            enabled: raw.cache.enabled.unwrap_or(cache_defaults.enabled),
            redis_url: raw.cache.redis_url,
            warmup_on_startup: raw
                .cache
                .warmup_on_startup
                .unwrap_or(cache_defaults.warmup_on_startup),
        };

        let token_ttl = raw
            .auth
            .token_ttl_seconds
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        if token_ttl == 0 {
            return Err(LoadError::invalid(
                "auth.token_ttl_seconds",
                "must be non-zero",
            ));
        }

        let websocket = WebSocketSettings {
            liveness_interval: nonzero_duration(
                "websocket.liveness_interval_seconds",
                raw.websocket
                    .liveness_interval_seconds
                    .unwrap_or(DEFAULT_LIVENESS_INTERVAL_SECS),
            )?,
            session_retention: nonzero_duration(
                "websocket.session_retention_seconds",
                raw.websocket
                    .session_retention_seconds
                    .unwrap_or(DEFAULT_SESSION_RETENTION_SECS),
            )?,
            retention_sweep_interval: nonzero_duration(
                "websocket.retention_sweep_interval_seconds",
                raw.websocket
                    .retention_sweep_interval_seconds
                    .unwrap_or(DEFAULT_RETENTION_SWEEP_INTERVAL_SECS),
            )?,
        };

        Ok(Self {
            server: ServerSettings {
                addr,
                graceful_shutdown: Duration::from_secs(
                    raw.server
                        .graceful_shutdown_seconds
                        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
                ),
            },
            logging: LoggingSettings { level, format },
            database: DatabaseSettings {
                url: raw.database.url,
                max_connections,
            },
            cache,
            auth: AuthSettings {
                signing_secret: raw.auth.signing_secret,
                token_ttl: Duration::from_secs(token_ttl),
            },
            websocket,
            lifecycle: LifecycleSettings {
                transition_delay: Duration::from_secs(
                    raw.lifecycle
                        .transition_delay_seconds
                        .unwrap_or(DEFAULT_TRANSITION_DELAY_SECS),
                ),
            },
        })
    }
}

fn nonzero_duration(key: &'static str, seconds: u64) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be non-zero"));
    }
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).unwrap();

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert!(settings.database.url.is_none());
        assert_eq!(settings.database.max_connections.get(), 8);
        assert!(settings.cache.enabled);
        assert!(settings.auth.signing_secret.is_none());
        assert_eq!(settings.auth.token_ttl, Duration::from_secs(3600));
        assert_eq!(
            settings.websocket.liveness_interval,
            Duration::from_secs(30)
        );
        assert_eq!(
            settings.websocket.session_retention,
            Duration::from_secs(1800)
        );
        assert_eq!(settings.lifecycle.transition_delay, Duration::from_secs(3));
    }

    #[test]
    fn cli_overrides_win() {
        let cli = CliArgs {
            server_port: Some(8088),
            log_level: Some("debug".to_string()),
            log_json: Some(true),
            redis_url: Some("redis://cache:6379".to_string()),
            transition_delay_seconds: Some(1),
            ..Default::default()
        };

        let mut raw = RawSettings::default();
        raw.apply_cli_overrides(&cli);
        let settings = Settings::from_raw(raw).unwrap();

        assert_eq!(settings.server.addr.port(), 8088);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
        assert_eq!(
            settings.cache.redis_url.as_deref(),
            Some("redis://cache:6379")
        );
        assert_eq!(settings.lifecycle.transition_delay, Duration::from_secs(1));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let raw = RawSettings {
            logging: RawLoggingSettings {
                level: Some("shout".to_string()),
                json: None,
            },
            ..Default::default()
        };
        assert!(Settings::from_raw(raw).is_err());

        let raw = RawSettings {
            database: RawDatabaseSettings {
                url: None,
                max_connections: Some(0),
            },
            ..Default::default()
        };
        assert!(Settings::from_raw(raw).is_err());

        let raw = RawSettings {
            websocket: RawWebSocketSettings {
                liveness_interval_seconds: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Settings::from_raw(raw).is_err());
    }
}
