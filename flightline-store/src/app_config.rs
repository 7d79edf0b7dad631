use config::ConfigError;
use flightline_core::IdentityScheme;
use flightline_proto::{MAX_DATAGRAM_LEN, MAX_REQUEST_LEN};
use flightline_shared::Flight;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub invocation: InvocationConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_datagram_size")]
    pub max_datagram_size: usize,
}

fn default_datagram_size() -> usize { MAX_REQUEST_LEN }

/// Upper bound for every duration setting: one year.
pub const MAX_CONFIGURED_SECONDS: u64 = 365 * 24 * 60 * 60;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_datagram_size: default_datagram_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// 0 leaves expiry entirely to notification passes.
    pub sweep_interval_seconds: u64,
    pub max_duration_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 30,
            max_duration_seconds: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PointsConfig {
    #[serde(default)]
    pub key_by: IdentityScheme,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationSemantics {
    #[default]
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvocationConfig {
    #[serde(default)]
    pub semantics: InvocationSemantics,
    pub reply_cache_ttl_seconds: u64,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            semantics: InvocationSemantics::AtMostOnce,
            reply_cache_ttl_seconds: 300,
        }
    }
}

/// Flights loaded into the in-memory backend at startup.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub flights: Vec<Flight>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // e.g. `FLIGHTLINE__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("FLIGHTLINE").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the serve loop cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.server.max_datagram_size;
        if !(MAX_REQUEST_LEN..=MAX_DATAGRAM_LEN).contains(&size) {
            return Err(ConfigError::Message(format!(
                "server.max_datagram_size must be between {} and {}, got {}",
                MAX_REQUEST_LEN, MAX_DATAGRAM_LEN, size
            )));
        }
        if self.monitor.max_duration_seconds == 0 {
            return Err(ConfigError::Message(
                "monitor.max_duration_seconds must be at least 1".to_string(),
            ));
        }

        let durations = [
            ("monitor.sweep_interval_seconds", self.monitor.sweep_interval_seconds),
            ("monitor.max_duration_seconds", self.monitor.max_duration_seconds),
            ("invocation.reply_cache_ttl_seconds", self.invocation.reply_cache_ttl_seconds),
        ];
        for (key, value) in durations {
            if value > MAX_CONFIGURED_SECONDS {
                return Err(ConfigError::Message(format!(
                    "{} must be at most {}, got {}",
                    key, MAX_CONFIGURED_SECONDS, value
                )));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
