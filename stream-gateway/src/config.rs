use std::env;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Process configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub brokers: String,
    pub topic: String,
    pub port: u16,
    pub version: String,
    pub topic_partitions: i32,
    pub topic_replication: i32,
    pub message_timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {var}: {source}")]
    Invalid {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

impl Config {
    /// Reads and validates the environment. All missing required variables
    /// are reported together so a broken deployment shows up in one log line.
    pub fn from_env() -> Result<Config, ConfigError> {
        let brokers = non_empty("KAFKA_BROKERS");
        let topic = non_empty("KAFKA_TOPIC");
        let port = non_empty("SERVER_PORT");
        let version = non_empty("VERSION");

        let mut missing = Vec::new();
        if brokers.is_none() {
            missing.push("KAFKA_BROKERS");
        }
        if topic.is_none() {
            missing.push("KAFKA_TOPIC");
        }
        if port.is_none() {
            missing.push("SERVER_PORT");
        }
        if version.is_none() {
            missing.push("VERSION");
        }

        let (Some(brokers), Some(topic), Some(port), Some(version)) =
            (brokers, topic, port, version)
        else {
            return Err(ConfigError::Missing(missing.join(", ")));
        };

        Ok(Config {
            brokers,
            topic,
            port: parse("SERVER_PORT", port)?,
            version,
            topic_partitions: parse_or("KAFKA_TOPIC_PARTITIONS", 3)?,
            topic_replication: parse_or("KAFKA_TOPIC_REPLICATION", 1)?,
            message_timeout_ms: parse_or("KAFKA_MESSAGE_TIMEOUT_MS", 5000)?,
        })
    }

    /// Log filter for the process. Read separately so logging can be
    /// initialized before configuration validation runs.
    pub fn log_level_from_env() -> String {
        non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string())
    }
}

// An empty value counts as unset.
fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    value
        .parse()
        .map_err(|source| ConfigError::Invalid { var, value, source })
}

fn parse_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    match non_empty(var) {
        Some(value) => parse(var, value),
        None => Ok(default),
    }
}
