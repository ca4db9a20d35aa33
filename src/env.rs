use dotenv::dotenv;
use std::env;
use std::time::Duration;

use crate::config::{self, FileConfig};
use crate::rabbitmq::{Result, SubscriberError};

/// Runtime settings of the subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub amqp_addr: String,
    pub rabbitmq_connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config::from(FileConfig::default())
    }
}

impl From<FileConfig> for Config {
    fn from(file: FileConfig) -> Self {
        Config {
            amqp_addr: file.connection.uri,
            rabbitmq_connect_timeout_ms: file.connection.connection_timeout_ms,
        }
    }
}

impl Config {
    /// Defaults, overridden by the config file, overridden by the environment.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        let base = config::load_config()?.map(Config::from).unwrap_or_default();
        base.with_overrides(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Config::default().with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("AMQP_ADDR") {
            self.amqp_addr = addr;
        }
        if let Some(val) = lookup("RABBITMQ_CONNECT_TIMEOUT_SECONDS") {
            let seconds: u64 = val.trim().parse().map_err(|e| {
                SubscriberError::Config(format!(
                    "RABBITMQ_CONNECT_TIMEOUT_SECONDS must be a whole number of seconds: {}",
                    e
                ))
            })?;
            self.rabbitmq_connect_timeout_ms = seconds.saturating_mul(1000);
        }

        if self.amqp_addr.trim().is_empty() {
            return Err(SubscriberError::Config("AMQP address cannot be empty".to_string()));
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.rabbitmq_connect_timeout_ms)
    }
}
