//! Configuration file parsing and management.
//!
//! This module handles loading configuration from JSON or TOML files and the
//! environment, and merging them with proper precedence rules:
//! defaults < config file < environment. Command-line flags are applied on top
//! by the binary.

use crate::error::WatchError;
use crate::types::WatchConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Shortest timeout that can complete a network exchange.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Configuration loaded from a JSON or TOML file.
///
/// Every field is optional; missing fields keep the lower-precedence value.
/// Unrecognised keys (such as the SMTP settings of older deployments) are
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Domains to monitor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,

    /// Expiry warning threshold in days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_days: Option<i64>,

    /// Directory holding the state files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// WHOIS attempts per lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<usize>,

    /// Base WHOIS backoff ("2s" or a bare integer, see [`DurationUnit`])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<DurationValue>,

    /// Maximum concurrent domain checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-operation timeout ("5s" or a bare integer, see [`DurationUnit`])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationValue>,

    /// Shell command run for every notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_command: Option<String>,

    /// DNS resolver override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<IpAddr>,

    /// Unit of bare integer durations, decided by the file format
    #[serde(skip)]
    pub integer_unit: DurationUnit,
}

/// Unit of a duration written as a bare integer.
///
/// JSON files keep the nanosecond integers of older deployments; TOML files
/// read them as seconds, like the environment and the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationUnit {
    #[default]
    Seconds,
    Nanoseconds,
}

/// A duration as written in a config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    /// Bare integer
    Integer(u64),
    /// Text with a unit: "500ms", "2s", "1m", "1h"
    Text(String),
}

impl DurationValue {
    pub fn to_duration(&self, unit: DurationUnit) -> Result<Duration, WatchError> {
        match self {
            Self::Integer(value) => Ok(match unit {
                DurationUnit::Seconds => Duration::from_secs(*value),
                DurationUnit::Nanoseconds => Duration::from_nanos(*value),
            }),
            Self::Text(text) => parse_duration_string(text).ok_or_else(|| {
                WatchError::config(format!(
                    "Invalid duration format '{}'. Use format like '500ms', '2s', '1m'",
                    text
                ))
            }),
        }
    }
}

impl FileConfig {
    /// Overlay the values present in this file onto `config`.
    pub fn apply(&self, mut config: WatchConfig) -> Result<WatchConfig, WatchError> {
        if let Some(domains) = &self.domains {
            config.domains = domains.clone();
        }
        if let Some(days) = self.threshold_days {
            config.threshold_days = days;
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(backoff) = &self.backoff {
            config.backoff = backoff.to_duration(self.integer_unit)?;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = &self.timeout {
            config.timeout = timeout.to_duration(self.integer_unit)?;
        }
        if let Some(command) = &self.notify_command {
            config.notify_command = Some(command.clone()).filter(|c| !c.trim().is_empty());
        }
        if let Some(nameserver) = self.nameserver {
            config.nameserver = Some(nameserver);
        }
        Ok(config)
    }
}

/// Configuration loading and validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager;

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a specific file.
    ///
    /// Files ending in `.json` are read as JSON, anything else as TOML.
    /// Bare integer durations are nanoseconds in JSON and seconds in TOML.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, WatchError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(WatchError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            WatchError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: FileConfig = if is_json {
            let mut config: FileConfig = serde_json::from_str(&content).map_err(|e| {
                WatchError::config(format!("Failed to parse JSON configuration: {}", e))
            })?;
            config.integer_unit = DurationUnit::Nanoseconds;
            config
        } else {
            toml::from_str(&content)?
        };

        // Validate the file on its own so errors point at it
        self.validate_config(&config.apply(WatchConfig::default())?)?;
        debug!(path = %path.display(), "Loaded configuration file");

        Ok(config)
    }

    /// Merge defaults, an optional file and the environment, then validate.
    pub fn resolve(
        &self,
        file: Option<&FileConfig>,
        env: &EnvConfig,
    ) -> Result<WatchConfig, WatchError> {
        let mut config = WatchConfig::default();
        if let Some(file) = file {
            config = file.apply(config)?;
        }
        config = env.apply(config);

        self.validate_config(&config)?;
        Ok(config)
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &WatchConfig) -> Result<(), WatchError> {
        if config.concurrency == 0 || config.concurrency > 100 {
            return Err(WatchError::config("Concurrency must be between 1 and 100"));
        }
        if config.retries == 0 {
            return Err(WatchError::config("Retries must be at least 1"));
        }
        if config.timeout < MIN_TIMEOUT {
            return Err(WatchError::config("Timeout must be at least 1ms"));
        }
        if config.threshold_days < 0 {
            return Err(WatchError::config("Threshold days cannot be negative"));
        }
        if config.state_dir.as_os_str().is_empty() {
            return Err(WatchError::config("State directory cannot be empty"));
        }
        Ok(())
    }
}

/// Environment variable configuration.
///
/// Values that fail to parse are logged as warnings and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub domains: Option<Vec<String>>,
    pub threshold_days: Option<i64>,
    pub state_dir: Option<PathBuf>,
    pub retries: Option<usize>,
    pub backoff: Option<Duration>,
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
    pub notify_command: Option<String>,
    pub nameserver: Option<IpAddr>,
    /// CONFIG_FILE - config file to load
    pub config_file: Option<PathBuf>,
}

impl EnvConfig {
    /// Overlay the values present in the environment onto `config`.
    pub fn apply(&self, mut config: WatchConfig) -> WatchConfig {
        if let Some(domains) = &self.domains {
            config.domains = domains.clone();
        }
        if let Some(days) = self.threshold_days {
            config.threshold_days = days;
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(backoff) = self.backoff {
            config.backoff = backoff;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(command) = &self.notify_command {
            config.notify_command = Some(command.clone());
        }
        if let Some(nameserver) = self.nameserver {
            config.nameserver = Some(nameserver);
        }
        config
    }
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    // DOMAINS - comma-separated domain list
    if let Some(list) = lookup("DOMAINS") {
        let domains: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !domains.is_empty() {
            env_config.domains = Some(domains);
        }
    }

    if let Some(val) = lookup("THRESHOLD_DAYS") {
        match val.trim().parse::<i64>() {
            Ok(days) if days >= 0 => env_config.threshold_days = Some(days),
            _ => warn!("Invalid THRESHOLD_DAYS='{}', must be a non-negative integer", val),
        }
    }

    if let Some(dir) = lookup("STATE_DIR") {
        if !dir.trim().is_empty() {
            env_config.state_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    if let Some(val) = lookup("RETRIES") {
        match val.trim().parse::<usize>() {
            Ok(retries) if retries > 0 => env_config.retries = Some(retries),
            _ => warn!("Invalid RETRIES='{}', must be at least 1", val),
        }
    }

    if let Some(val) = lookup("BACKOFF") {
        match parse_duration_string(&val) {
            Some(backoff) => env_config.backoff = Some(backoff),
            None => warn!("Invalid BACKOFF='{}', use format like '500ms', '2s'", val),
        }
    }

    if let Some(val) = lookup("CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if concurrency > 0 && concurrency <= 100 => {
                env_config.concurrency = Some(concurrency)
            }
            _ => warn!("Invalid CONCURRENCY='{}', must be 1-100", val),
        }
    }

    if let Some(val) = lookup("TIMEOUT") {
        match parse_duration_string(&val) {
            Some(timeout) if !timeout.is_zero() => env_config.timeout = Some(timeout),
            _ => warn!("Invalid TIMEOUT='{}', use format like '5s', '30s'", val),
        }
    }

    if let Some(command) = lookup("NOTIFY_COMMAND") {
        if !command.trim().is_empty() {
            env_config.notify_command = Some(command);
        }
    }

    if let Some(val) = lookup("NAMESERVER") {
        match val.trim().parse::<IpAddr>() {
            Ok(ip) => env_config.nameserver = Some(ip),
            Err(_) => warn!("Invalid NAMESERVER='{}', must be an IP address", val),
        }
    }

    if let Some(path) = lookup("CONFIG_FILE") {
        if !path.trim().is_empty() {
            env_config.config_file = Some(PathBuf::from(path.trim()));
        }
    }

    env_config
}

/// Parse a duration string like "500ms", "5s", "2m" or "1h".
///
/// A bare number is read as seconds.
pub fn parse_duration_string(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();

    if let Some(ms) = text.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = text.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = text.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = text.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        text.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_env_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration_string("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("invalid"), None);
        assert_eq!(parse_duration_string("-1s"), None);
    }

    #[test]
    fn test_load_toml_config() {
        let config_content = r#"
domains = ["example.com", "example.org"]
threshold_days = 30
state_dir = "/var/lib/domain-watch"
retries = 5
backoff = "500ms"
timeout = "10s"
notify_command = "logger -t domain-watch \"$DOMAIN_WATCH_MESSAGE\""
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new();
        let file = manager.load_file(temp_file.path()).unwrap();
        let config = manager.resolve(Some(&file), &EnvConfig::default()).unwrap();

        assert_eq!(config.domains, vec!["example.com", "example.org"]);
        assert_eq!(config.threshold_days, 30);
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/domain-watch"));
        assert_eq!(config.retries, 5);
        assert_eq!(config.backoff, Duration::from_millis(500));
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.notify_command.unwrap().starts_with("logger"));
    }

    #[test]
    fn test_load_json_config_with_nanosecond_durations() {
        let config_content = r#"{
  "domains": ["example.com"],
  "threshold_days": 14,
  "state_dir": "/data",
  "smtp_host": "smtp.example.com",
  "smtp_port": 587,
  "retries": 3,
  "backoff": 2000000000,
  "concurrency": 8,
  "timeout": 5000000000
}"#;

        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let file = ConfigManager::new().load_file(temp_file.path()).unwrap();
        assert_eq!(file.backoff, Some(DurationValue::Integer(2_000_000_000)));
        assert_eq!(file.integer_unit, DurationUnit::Nanoseconds);

        let config = file.apply(WatchConfig::default()).unwrap();
        assert_eq!(config.backoff, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.threshold_days, 14);
    }

    #[test]
    fn test_toml_integer_durations_are_seconds() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"timeout = 5\nbackoff = 2\n").unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new();
        let file = manager.load_file(temp_file.path()).unwrap();
        assert_eq!(file.integer_unit, DurationUnit::Seconds);

        let config = manager.resolve(Some(&file), &EnvConfig::default()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_sub_millisecond_timeout_rejected() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        temp_file.write_all(br#"{"timeout": 5}"#).unwrap();
        temp_file.flush().unwrap();

        match ConfigManager::new().load_file(temp_file.path()) {
            Err(WatchError::ConfigError { message }) => {
                assert!(message.contains("at least 1ms"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"concurrency = 0\n").unwrap();
        temp_file.flush().unwrap();

        let result = ConfigManager::new().load_file(temp_file.path());
        assert!(matches!(result, Err(WatchError::ConfigError { .. })));
    }

    #[test]
    fn test_invalid_duration_and_syntax() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"timeout = \"soon\"\n").unwrap();
        temp_file.flush().unwrap();
        assert!(ConfigManager::new().load_file(temp_file.path()).is_err());

        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        temp_file.write_all(b"{ \"domains\": ").unwrap();
        temp_file.flush().unwrap();
        assert!(matches!(
            ConfigManager::new().load_file(temp_file.path()),
            Err(WatchError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigManager::new().load_file("/nonexistent/domain-watch.toml");
        assert!(matches!(result, Err(WatchError::FileError { .. })));
    }

    #[test]
    fn test_env_config_parsing() {
        let env = env_from(&[
            ("DOMAINS", " example.com, ,example.org "),
            ("THRESHOLD_DAYS", "21"),
            ("STATE_DIR", "/tmp/state"),
            ("RETRIES", "4"),
            ("BACKOFF", "250ms"),
            ("CONCURRENCY", "12"),
            ("TIMEOUT", "3s"),
            ("NAMESERVER", "1.1.1.1"),
            ("CONFIG_FILE", "/etc/domain-watch.toml"),
        ]);

        assert_eq!(
            env.domains,
            Some(vec!["example.com".to_string(), "example.org".to_string()])
        );
        assert_eq!(env.threshold_days, Some(21));
        assert_eq!(env.state_dir, Some(PathBuf::from("/tmp/state")));
        assert_eq!(env.retries, Some(4));
        assert_eq!(env.backoff, Some(Duration::from_millis(250)));
        assert_eq!(env.concurrency, Some(12));
        assert_eq!(env.timeout, Some(Duration::from_secs(3)));
        assert_eq!(env.nameserver, Some("1.1.1.1".parse().unwrap()));
        assert_eq!(env.config_file, Some(PathBuf::from("/etc/domain-watch.toml")));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let env = env_from(&[
            ("THRESHOLD_DAYS", "-3"),
            ("RETRIES", "0"),
            ("CONCURRENCY", "500"),
            ("TIMEOUT", "0s"),
            ("BACKOFF", "fast"),
            ("NAMESERVER", "dns.example"),
        ]);

        assert_eq!(env, EnvConfig::default());
    }

    #[test]
    fn test_precedence_env_over_file() {
        let file = FileConfig {
            threshold_days: Some(10),
            concurrency: Some(3),
            domains: Some(vec!["from-file.com".to_string()]),
            ..FileConfig::default()
        };
        let env = env_from(&[("CONCURRENCY", "9")]);

        let config = ConfigManager::new().resolve(Some(&file), &env).unwrap();

        assert_eq!(config.threshold_days, 10);
        assert_eq!(config.concurrency, 9);
        assert_eq!(config.domains, vec!["from-file.com"]);
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn test_validate_config() {
        let manager = ConfigManager::new();
        assert!(manager.validate_config(&WatchConfig::default()).is_ok());

        let mut config = WatchConfig::default();
        config.retries = 0;
        assert!(manager.validate_config(&config).is_err());

        let config = WatchConfig::default().with_timeout(Duration::ZERO);
        assert!(manager.validate_config(&config).is_err());

        let config = WatchConfig::default().with_timeout(Duration::from_micros(999));
        assert!(manager.validate_config(&config).is_err());

        let config = WatchConfig::default().with_timeout(Duration::from_millis(1));
        assert!(manager.validate_config(&config).is_ok());

        let config = WatchConfig::default().with_threshold_days(-1);
        assert!(manager.validate_config(&config).is_err());
    }
}
