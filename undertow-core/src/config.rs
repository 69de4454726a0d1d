//! Centralized configuration for Undertow.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

use crate::UndertowError;
use crate::dht::EntryPoint;

/// Central configuration for all Undertow components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub scheduler: SchedulerConfig,
    pub dns: DnsConfig,
    pub dht: DhtConfig,
    pub tracker: TrackerConfig,
    pub logging: LoggingConfig,
}

/// Command queue pacing.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between passes when no resolution is outstanding
    pub pass_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_millis(100),
        }
    }
}

/// Hostname resolution configuration.
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Resolve on the blocking pool and poll, instead of resolving inline
    pub async_dns: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self { async_dns: true }
    }
}

/// DHT bootstrap configuration.
///
/// Controls which entry points are resolved and whether the routing table
/// is populated with a self lookup once they are known.
#[derive(Debug, Clone)]
pub struct DhtConfig {
    /// Bootstrap nodes to ping when joining the network
    pub entry_points: Vec<EntryPoint>,
    /// Schedule node lookup and bucket refresh after resolving entry points
    pub bootstrap_enabled: bool,
    /// Timeout handed to each entry point ping task
    pub ping_timeout: Duration,
    /// Maximum number of pending periodic tasks
    pub task_queue_capacity: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            entry_points: vec![
                EntryPoint::new("router.bittorrent.com", 6881),
                EntryPoint::new("dht.transmissionbt.com", 6881),
            ],
            bootstrap_enabled: true,
            ping_timeout: Duration::from_secs(10),
            task_queue_capacity: 1024,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console level; `RUST_LOG` takes precedence when set
    pub console_level: Level,
    /// Directory holding the per-run trace log
    pub logs_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Level::INFO,
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// Tracker communication configuration.
///
/// Controls HTTP timeouts, announce intervals and how many peers a
/// download asks for.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// HTTP request timeout for tracker communication
    pub tracker_timeout: Duration,
    /// Interval used until a tracker supplies its own
    pub default_announce_interval: Duration,
    /// Interval override chosen by the user (None = follow tracker)
    pub user_announce_interval: Option<Duration>,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// Peers requested per announce while below the minimum
    pub num_want: u32,
    /// Download keeps asking trackers for peers below this count
    pub min_peers: usize,
    /// Upper bound on peers remembered per download
    pub max_known_peers: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracker_timeout: Duration::from_secs(60),
            default_announce_interval: Duration::from_secs(1800), // 30 minutes
            user_announce_interval: None,
            user_agent: "undertow/0.1.0",
            num_want: 50,
            min_peers: 40,
            max_known_peers: 1024,
        }
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Malformed numeric overrides are ignored; a malformed entry point list
    /// is rejected.
    ///
    /// # Errors
    ///
    /// - `UndertowError::Configuration` - If `UNDERTOW_DHT_ENTRY_POINTS` contains an invalid `host:port`
    /// - `UndertowError::Configuration` - If `UNDERTOW_LOG_LEVEL` is not a tracing level
    pub fn from_env() -> Result<Self, UndertowError> {
        let mut config = Self::default();

        if let Ok(enabled) = std::env::var("UNDERTOW_ASYNC_DNS") {
            config.dns.async_dns = enabled.parse().unwrap_or(config.dns.async_dns);
        }

        if let Ok(enabled) = std::env::var("UNDERTOW_DHT_BOOTSTRAP") {
            config.dht.bootstrap_enabled = enabled.parse().unwrap_or(config.dht.bootstrap_enabled);
        }

        if let Ok(list) = std::env::var("UNDERTOW_DHT_ENTRY_POINTS") {
            config.dht.entry_points = list
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(EntryPoint::parse)
                .collect::<Result<_, _>>()
                .map_err(|e| UndertowError::Configuration {
                    reason: e.to_string(),
                })?;
        }

        if let Ok(timeout) = std::env::var("UNDERTOW_TRACKER_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.tracker.tracker_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(min_peers) = std::env::var("UNDERTOW_MIN_PEERS") {
            if let Ok(count) = min_peers.parse::<usize>() {
                config.tracker.min_peers = count;
            }
        }

        if let Ok(interval) = std::env::var("UNDERTOW_PASS_INTERVAL_MS") {
            if let Ok(millis) = interval.parse::<u64>() {
                config.scheduler.pass_interval = Duration::from_millis(millis);
            }
        }

        if let Ok(level) = std::env::var("UNDERTOW_LOG_LEVEL") {
            config.logging.console_level = level.parse().map_err(|_| {
                UndertowError::Configuration {
                    reason: format!("Invalid log level: {level}"),
                }
            })?;
        }

        if let Ok(dir) = std::env::var("UNDERTOW_LOGS_DIR") {
            config.logging.logs_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Resolution is inline, there are no default entry points and passes
    /// run back to back.
    pub fn for_testing() -> Self {
        Self {
            scheduler: SchedulerConfig {
                pass_interval: Duration::ZERO,
            },
            dns: DnsConfig { async_dns: false },
            dht: DhtConfig {
                entry_points: Vec::new(),
                ..Default::default()
            },
            tracker: TrackerConfig {
                tracker_timeout: Duration::from_secs(5),
                ..Default::default()
            },
            logging: LoggingConfig {
                console_level: Level::WARN,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = UndertowConfig::default();

        assert!(config.dns.async_dns);
        assert!(config.dht.bootstrap_enabled);
        assert_eq!(config.dht.ping_timeout, Duration::from_secs(10));
        assert_eq!(config.dht.entry_points.len(), 2);
        assert_eq!(config.dht.entry_points[0].port, 6881);
        assert_eq!(config.tracker.num_want, 50);
        assert_eq!(
            config.tracker.default_announce_interval,
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn test_testing_preset() {
        let config = UndertowConfig::for_testing();
        assert!(!config.dns.async_dns);
        assert!(config.dht.entry_points.is_empty());
        assert_eq!(config.scheduler.pass_interval, Duration::ZERO);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("UNDERTOW_ASYNC_DNS", "false");
            std::env::set_var("UNDERTOW_DHT_ENTRY_POINTS", "192.0.2.5:6881, node.example.org:6882");
            std::env::set_var("UNDERTOW_TRACKER_TIMEOUT", "15");
            std::env::set_var("UNDERTOW_MIN_PEERS", "7");
            std::env::set_var("UNDERTOW_PASS_INTERVAL_MS", "5");
            std::env::set_var("UNDERTOW_DHT_BOOTSTRAP", "sometimes");
            std::env::set_var("UNDERTOW_LOG_LEVEL", "debug");
            std::env::set_var("UNDERTOW_LOGS_DIR", "/tmp/undertow-logs");
        }

        let config = UndertowConfig::from_env().unwrap();

        assert!(!config.dns.async_dns);
        assert_eq!(
            config.dht.entry_points,
            vec![
                EntryPoint::new("192.0.2.5", 6881),
                EntryPoint::new("node.example.org", 6882)
            ]
        );
        assert_eq!(config.tracker.tracker_timeout, Duration::from_secs(15));
        assert_eq!(config.tracker.min_peers, 7);
        assert_eq!(config.scheduler.pass_interval, Duration::from_millis(5));
        assert!(config.dht.bootstrap_enabled);
        assert_eq!(config.logging.console_level, Level::DEBUG);
        assert_eq!(config.logging.logs_dir, PathBuf::from("/tmp/undertow-logs"));

        unsafe {
            std::env::set_var("UNDERTOW_DHT_BOOTSTRAP", "false");
        }
        assert!(!UndertowConfig::from_env().unwrap().dht.bootstrap_enabled);

        unsafe {
            std::env::set_var("UNDERTOW_LOG_LEVEL", "chatty");
        }
        assert!(matches!(
            UndertowConfig::from_env(),
            Err(UndertowError::Configuration { .. })
        ));

        unsafe {
            std::env::remove_var("UNDERTOW_LOG_LEVEL");
            std::env::set_var("UNDERTOW_DHT_ENTRY_POINTS", "missing-port");
        }
        assert!(matches!(
            UndertowConfig::from_env(),
            Err(UndertowError::Configuration { .. })
        ));

        // Cleanup
        unsafe {
            std::env::remove_var("UNDERTOW_ASYNC_DNS");
            std::env::remove_var("UNDERTOW_DHT_ENTRY_POINTS");
            std::env::remove_var("UNDERTOW_TRACKER_TIMEOUT");
            std::env::remove_var("UNDERTOW_MIN_PEERS");
            std::env::remove_var("UNDERTOW_PASS_INTERVAL_MS");
            std::env::remove_var("UNDERTOW_DHT_BOOTSTRAP");
            std::env::remove_var("UNDERTOW_LOGS_DIR");
        }
    }
}
