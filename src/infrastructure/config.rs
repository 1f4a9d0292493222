use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::Duration;

use compact_str::CompactString;
use thiserror::Error;

use crate::infrastructure::server_impl::codec::FramingLimits;
use crate::infrastructure::server_impl::event_loop::default_loop_count;

pub const HOST_VAR: &str = "LAYOUTKIT_HOST";
pub const PORT_VAR: &str = "LAYOUTKIT_PORT";
pub const EVENT_LOOPS_VAR: &str = "LAYOUTKIT_EVENT_LOOPS";
pub const HANDLER_THREADS_VAR: &str = "LAYOUTKIT_HANDLER_THREADS";
pub const IDLE_TIMEOUT_VAR: &str = "LAYOUTKIT_IDLE_TIMEOUT_SECS";
pub const MAX_BODY_VAR: &str = "LAYOUTKIT_MAX_BODY_BYTES";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: CompactString,
    pub port: u16,
    /// Number of event loop threads connections are spread over.
    pub event_loops: usize,
    /// Worker threads of the pool handlers run on. A blocking handler holds
    /// one of them until it returns.
    pub handler_threads: usize,
    /// `None` keeps idle connections open forever.
    pub idle_timeout: Option<Duration>,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = FramingLimits::default();
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            event_loops: default_loop_count(),
            handler_threads: default_loop_count().max(2),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_head_bytes: limits.max_head_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to the defaults for unset
    /// or empty keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get(HOST_VAR) {
            config.host = host.trim().into();
        }
        if let Some(port) = get(PORT_VAR) {
            config.port = parse(PORT_VAR, &port, "expected a port number")?;
        }
        if let Some(loops) = get(EVENT_LOOPS_VAR) {
            config.event_loops = parse(EVENT_LOOPS_VAR, &loops, "expected a positive integer")?;
            if config.event_loops == 0 {
                return Err(invalid(EVENT_LOOPS_VAR, &loops, "at least one event loop is required"));
            }
        }
        if let Some(threads) = get(HANDLER_THREADS_VAR) {
            config.handler_threads =
                parse(HANDLER_THREADS_VAR, &threads, "expected a positive integer")?;
            if config.handler_threads == 0 {
                return Err(invalid(HANDLER_THREADS_VAR, &threads, "at least one handler thread is required"));
            }
        }
        if let Some(secs) = get(IDLE_TIMEOUT_VAR) {
            let secs: u64 = parse(IDLE_TIMEOUT_VAR, &secs, "expected whole seconds")?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(bytes) = get(MAX_BODY_VAR) {
            config.max_body_bytes = parse(MAX_BODY_VAR, &bytes, "expected a byte count")?;
        }

        Ok(config)
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn bind_address(&self) -> String {
        match Ipv6Addr::from_str(&self.host) {
            Ok(_) => format!("[{}]:{}", self.host, self.port),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn limits(&self) -> FramingLimits {
        FramingLimits {
            max_head_bytes: self.max_head_bytes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str, reason: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value, reason))
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_listen_on_loopback_8080() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(60)));
        assert!(config.event_loops >= 1);
        assert!(config.handler_threads >= 2);
        assert_eq!(config.limits(), FramingLimits::default());
    }

    #[test]
    fn host_and_port_are_overridable() {
        let config =
            ServerConfig::from_lookup(lookup(&[(HOST_VAR, "0.0.0.0"), (PORT_VAR, "9000")]))
                .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let config = ServerConfig::from_lookup(lookup(&[(HOST_VAR, "::1")])).unwrap();
        assert_eq!(config.bind_address(), "[::1]:8080");
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[(PORT_VAR, "  ")])).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn zero_idle_timeout_disables_it() {
        let config = ServerConfig::from_lookup(lookup(&[(IDLE_TIMEOUT_VAR, "0")])).unwrap();
        assert_eq!(config.idle_timeout, None);

        let config = ServerConfig::from_lookup(lookup(&[(IDLE_TIMEOUT_VAR, "5")])).unwrap();
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn handler_threads_are_overridable() {
        let config = ServerConfig::from_lookup(lookup(&[(HANDLER_THREADS_VAR, "6")])).unwrap();
        assert_eq!(config.handler_threads, 6);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[(PORT_VAR, "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: PORT_VAR, .. }));

        let err = ServerConfig::from_lookup(lookup(&[(PORT_VAR, "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: PORT_VAR, .. }));

        let err = ServerConfig::from_lookup(lookup(&[(EVENT_LOOPS_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: EVENT_LOOPS_VAR, .. }));

        let err = ServerConfig::from_lookup(lookup(&[(HANDLER_THREADS_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: HANDLER_THREADS_VAR, .. }));

        let config = ServerConfig::from_lookup(lookup(&[(MAX_BODY_VAR, "1024")])).unwrap();
        assert_eq!(config.limits().max_body_bytes, 1024);
    }
}
