use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const DNS_RECORD_POLL_INTERVAL_SECONDS: &str = "DNS_RECORD_POLL_INTERVAL_SECONDS";
pub const DNS_RECORD_POLL_MAX_ATTEMPTS: &str = "DNS_RECORD_POLL_MAX_ATTEMPTS";
pub const REINVOKE_INTERVAL_SECONDS: &str = "REINVOKE_INTERVAL_SECONDS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
    },
}

/// How long to wait for a certificate's DNS validation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval: Duration::from_secs(15),
            max_attempts: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `env_logger` filter directives.
    pub log_level: String,
    pub polling: PollingConfig,
    /// Pause before handing a pending certificate over to the next invocation.
    pub reinvoke_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".into(),
            polling: Default::default(),
            reinvoke_interval: Duration::from_secs(15),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to the defaults
    /// for unset or empty variables.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let max_attempts = parse(&lookup, DNS_RECORD_POLL_MAX_ATTEMPTS, defaults.polling.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid { name: DNS_RECORD_POLL_MAX_ATTEMPTS, value: "0".into() });
        }

        Ok(Config {
            log_level: lookup(LOG_LEVEL).unwrap_or(defaults.log_level),
            polling: PollingConfig {
                interval: Duration::from_secs(parse(&lookup, DNS_RECORD_POLL_INTERVAL_SECONDS, defaults.polling.interval.as_secs())?),
                max_attempts: max_attempts,
            },
            reinvoke_interval: Duration::from_secs(parse(&lookup, REINVOKE_INTERVAL_SECONDS, defaults.reinvoke_interval.as_secs())?),
        })
    }
}

fn parse<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name: name, value: value }),
        None => Ok(default),
    }
}
