//! API configuration
//!
//! Read from `API_`-prefixed environment variables after an optional `.env`
//! file has been loaded. Every field has a default, so an empty environment
//! yields a runnable local configuration.

use std::time::Duration;

use serde::Deserialize;

use domain_policy::SchedulerConfig;
use infra_db::DatabaseConfig;
use infra_messaging::{DispatcherConfig, EventBusConfig};

/// Process configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// `trace`, `debug`, `info`, `warn` or `error`; `RUST_LOG` wins when set
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    /// Business rules file (JSON, YAML or TOML); built-in defaults when unset
    pub rules_path: Option<String>,
    pub request_timeout_secs: u64,
    pub default_workers: usize,
    pub payout_workers: usize,
    pub notification_workers: usize,
    pub job_shutdown_timeout_secs: u64,
    pub event_bus_capacity: usize,
    pub event_drain_timeout_secs: u64,
    /// Run the lifecycle sweeps in this process
    pub scheduler_enabled: bool,
    pub expired_sweep_interval_secs: u64,
    pub grace_period_sweep_interval_secs: u64,
    pub auto_renewal_sweep_interval_secs: u64,
    pub reminder_sweep_interval_secs: u64,
    pub renewal_reminder_days: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/marketplace".to_string(),
            database_max_connections: 10,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            rules_path: None,
            request_timeout_secs: 30,
            default_workers: 2,
            payout_workers: 2,
            notification_workers: 1,
            job_shutdown_timeout_secs: 30,
            event_bus_capacity: 1024,
            event_drain_timeout_secs: 5,
            scheduler_enabled: true,
            expired_sweep_interval_secs: 3600,
            grace_period_sweep_interval_secs: 3600,
            auto_renewal_sweep_interval_secs: 6 * 3600,
            reminder_sweep_interval_secs: 24 * 3600,
            renewal_reminder_days: 30,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    ///
    /// `.env` is read first if present; a missing file is not an error.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url).max_connections(self.database_max_connections)
    }

    pub fn event_bus(&self) -> EventBusConfig {
        EventBusConfig {
            buffer_size: self.event_bus_capacity,
            drain_timeout: Duration::from_secs(self.event_drain_timeout_secs),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            default_workers: self.default_workers,
            shutdown_timeout: Duration::from_secs(self.job_shutdown_timeout_secs),
            ..DispatcherConfig::default()
        }
        .with_queue(domain_claims::PAYOUT_QUEUE, self.payout_workers)
        .with_queue(domain_policy::NOTIFICATION_QUEUE, self.notification_workers)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            expired_policies_interval: Duration::from_secs(self.expired_sweep_interval_secs),
            grace_period_interval: Duration::from_secs(self.grace_period_sweep_interval_secs),
            auto_renewal_interval: Duration::from_secs(self.auto_renewal_sweep_interval_secs),
            renewal_reminder_interval: Duration::from_secs(self.reminder_sweep_interval_secs),
            reminder_days_ahead: self.renewal_reminder_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_runnable() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.rules_path.is_none());
    }

    #[test]
    fn test_dispatcher_sizes_named_queues() {
        let config = ApiConfig {
            payout_workers: 4,
            ..ApiConfig::default()
        };
        let dispatcher = config.dispatcher();
        assert_eq!(dispatcher.queue_workers.get(domain_claims::PAYOUT_QUEUE), Some(&4));
        assert_eq!(dispatcher.queue_workers.get(domain_policy::NOTIFICATION_QUEUE), Some(&1));
    }
}
