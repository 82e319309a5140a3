use chrono::Duration;
use serde::Deserialize;
use std::env;

/// Longest payment window a reservation can be given: one week.
pub const MAX_EXPIRATION_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a `url` the service runs on the in-process store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// Minutes a reservation may stay unpaid before the sweeper releases it.
    #[serde(default = "default_expiration_minutes")]
    pub expiration_minutes: i64,
    /// Sweeper period; 0 turns the sweeper off.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            expiration_minutes: default_expiration_minutes(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl BookingRules {
    /// Payment window for reservations booked without an explicit deadline.
    pub fn reservation_window(&self) -> Result<Duration, String> {
        if !(1..=MAX_EXPIRATION_MINUTES).contains(&self.expiration_minutes) {
            return Err(format!(
                "expiration_minutes must be between 1 and {}, got {}",
                MAX_EXPIRATION_MINUTES, self.expiration_minutes
            ));
        }
        Duration::try_minutes(self.expiration_minutes)
            .ok_or_else(|| format!("expiration_minutes {} is out of range", self.expiration_minutes))
    }
}

fn default_expiration_minutes() -> i64 { 15 }
fn default_sweep_interval() -> u64 { 60 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `UTOPIA_BOOKING__EXPIRATION_MINUTES=30`
            .add_source(config::Environment::with_prefix("UTOPIA").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        self.booking
            .reservation_window()
            .map(|_| ())
            .map_err(config::ConfigError::Message)
    }
}
