//! Core data types for domain monitoring.
//!
//! This module defines the persisted per-domain state and the run
//! configuration shared (read-only) by every domain task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

const SECONDS_PER_DAY: i64 = 86_400;

/// Persisted monitoring state of one domain.
///
/// Serialized as a JSON object with exactly three fields. An unknown
/// expiration is written as the zero timestamp `0001-01-01T00:00:00Z` so
/// every record carries the same shape on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainState {
    /// Registration expiry, `None` while unknown
    #[serde(with = "zero_time")]
    pub expiration: Option<DateTime<Utc>>,

    /// An expiry warning was sent for the current expiration
    pub notified_expiry: bool,

    /// An availability notification was sent
    pub notified_available: bool,
}

impl DomainState {
    /// Whether the stored expiration is known and strictly in the future.
    pub fn has_valid_expiration(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiration, Some(expiration) if expiration > now)
    }

    /// Whole days until the stored expiration, rounded down.
    ///
    /// An expiration 36 hours away yields 1, one 12 hours in the past yields -1.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expiration
            .map(|expiration| days_between(now, expiration))
    }
}

/// Floor of the whole days from `from` to `to`.
pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Serde adapter mapping `None` to the zero timestamp and back.
pub(crate) mod zero_time {
    use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const ZERO: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => {
                serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            None => serializer.serialize_str(ZERO),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| de::Error::custom(format!("invalid expiration '{}': {}", raw, e)))?
            .with_timezone(&Utc);

        if is_zero(&parsed) {
            Ok(None)
        } else {
            Ok(Some(parsed))
        }
    }

    fn is_zero(time: &DateTime<Utc>) -> bool {
        NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|zero| time.naive_utc() == zero)
            .unwrap_or(false)
            || time.year() < 1
    }
}

/// Configuration for one monitoring pass.
///
/// Built by [`crate::ConfigManager`] from defaults, a config file, the
/// environment and CLI flags. The core treats every field as validated.
#[derive(Debug, Clone, Serialize)]
pub struct WatchConfig {
    /// Domains to monitor, in configured order
    pub domains: Vec<String>,

    /// Warn when a domain expires within this many days
    /// Default: 7
    pub threshold_days: i64,

    /// Directory holding one JSON state file per domain
    /// Default: /data
    pub state_dir: PathBuf,

    /// WHOIS attempts per lookup
    /// Default: 3
    pub retries: usize,

    /// Base delay of the WHOIS exponential backoff
    /// Default: 2 seconds
    #[serde(with = "duration_text")]
    pub backoff: Duration,

    /// Maximum number of domains checked at once
    /// Default: 5, Range: 1-100
    pub concurrency: usize,

    /// Deadline for each DNS exchange, WHOIS attempt and notify command
    /// Default: 5 seconds
    #[serde(with = "duration_text")]
    pub timeout: Duration,

    /// Shell command run for every notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_command: Option<String>,

    /// Resolver to query instead of the first `/etc/resolv.conf` entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<IpAddr>,
}

impl Default for WatchConfig {
    /// Defaults documented for the configuration provider.
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            threshold_days: 7,
            state_dir: PathBuf::from("/data"),
            retries: 3,
            backoff: Duration::from_secs(2),
            concurrency: 5,
            timeout: Duration::from_secs(5),
            notify_command: None,
            nameserver: None,
        }
    }
}

impl WatchConfig {
    /// Set the monitored domains.
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expiry warning threshold in days.
    pub fn with_threshold_days(mut self, days: i64) -> Self {
        self.threshold_days = days;
        self
    }

    /// Set the state directory.
    pub fn with_state_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Set WHOIS attempts and base backoff.
    pub fn with_retries(mut self, retries: usize, backoff: Duration) -> Self {
        self.retries = retries.max(1);
        self.backoff = backoff;
        self
    }

    /// Set concurrency, capped at 100 to prevent resource exhaustion.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    /// Set the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the notification command.
    pub fn with_notify_command<S: Into<String>>(mut self, command: S) -> Self {
        self.notify_command = Some(command.into());
        self
    }

    /// Pin the DNS resolver.
    pub fn with_nameserver(mut self, nameserver: IpAddr) -> Self {
        self.nameserver = Some(nameserver);
        self
    }
}

/// Durations printed the way they are configured ("2s", "500ms").
mod duration_text {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = value.as_millis();
        let text = if millis % 1000 == 0 {
            format!("{}s", millis / 1000)
        } else {
            format!("{}ms", millis)
        };
        serializer.serialize_str(&text)
    }
}
