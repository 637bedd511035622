use std::time::Duration;

use serde::Deserialize;

use crate::transport::{DEFAULT_KEEPALIVE, SessionOptions, generate_client_id};

/// Top-level configuration settings for the application.
///
/// Includes the broker connection, network wait policy and logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

/// Where and how to reach the broker.
///
/// `client_id` is generated when absent. Credentials are only sent when both
/// `username` and `password` are set.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub keepalive_secs: u64,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Bounds on waiting for the network before connecting.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub connect_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub network: Option<PartialNetworkSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub keepalive_secs: Option<u64>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialNetworkSettings {
    pub connect_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `defaults`.
    pub fn merge_onto(self, defaults: Settings) -> Settings {
        let broker = self.broker.unwrap_or_default();
        let network = self.network.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                host: broker.host.unwrap_or(defaults.broker.host),
                port: broker.port.unwrap_or(defaults.broker.port),
                path: broker.path.unwrap_or(defaults.broker.path),
                keepalive_secs: broker
                    .keepalive_secs
                    .unwrap_or(defaults.broker.keepalive_secs),
                client_id: broker.client_id.or(defaults.broker.client_id),
                username: broker.username.or(defaults.broker.username),
                password: broker.password.or(defaults.broker.password),
            },
            network: NetworkSettings {
                connect_timeout_ms: network
                    .connect_timeout_ms
                    .unwrap_or(defaults.network.connect_timeout_ms),
                poll_interval_ms: network
                    .poll_interval_ms
                    .unwrap_or(defaults.network.poll_interval_ms),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}

impl Settings {
    /// Session parameters for the configured broker.
    pub fn session_options(&self) -> SessionOptions {
        let broker = &self.broker;
        let mut options = SessionOptions::new(broker.host.clone(), broker.port)
            .with_client_id(
                broker
                    .client_id
                    .clone()
                    .unwrap_or_else(generate_client_id),
            )
            .with_keepalive(Duration::from_secs(broker.keepalive_secs));

        if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
            options = options.with_credentials(username.clone(), password.clone());
        }
        options
    }
}

impl NetworkSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                path: "/".to_string(),
                keepalive_secs: DEFAULT_KEEPALIVE.as_secs(),
                client_id: None,
                username: None,
                password: None,
            },
            network: NetworkSettings {
                connect_timeout_ms: 30_000,
                poll_interval_ms: 100,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
