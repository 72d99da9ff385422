//! WHOIS expiration lookup.
//!
//! The raw response comes from the system's `whois` command, which already
//! follows registry referrals. Only one field is extracted from the free-form
//! text: the registration expiry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{ExpirationSource, WhoisTransport};
use crate::error::WatchError;
use crate::expiration::parse_expiration;
use crate::retry::RetryPolicy;
use crate::types::WatchConfig;
use crate::utils::validate_domain;

lazy_static! {
    /// Expiry labels in the order they are trusted.
    static ref EXPIRATION_PATTERNS: Vec<Regex> = [
        r"(?im)^\s*Registry Expiry Date:[ \t]*(.*)$",
        r"(?im)^\s*Registrar Registration Expiration Date:[ \t]*(.*)$",
        r"(?im)^\s*Expir(?:y|ation) Date:[ \t]*(.*)$",
        r"(?im)^\s*Expires On:[ \t]*(.*)$",
        r"(?im)^\s*Expires:[ \t]*(.*)$",
        r"(?im)^\s*paid-till:[ \t]*(.*)$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect();
}

/// Longest slice of a WHOIS response kept inside a parse error.
const CONTENT_EXCERPT: usize = 256;

/// Extract the expiration field from a raw WHOIS response.
///
/// Values that are empty or redacted are skipped so a later, usable label
/// still wins.
pub fn parse_whois_expiration(raw: &str) -> Result<String, WatchError> {
    for pattern in EXPIRATION_PATTERNS.iter() {
        for caps in pattern.captures_iter(raw) {
            if let Some(m) = caps.get(1) {
                let value = m.as_str().trim();
                if !value.is_empty() && !value.to_lowercase().contains("redacted") {
                    return Ok(value.to_string());
                }
            }
        }
    }

    let excerpt: String = raw.chars().take(CONTENT_EXCERPT).collect();
    if reports_no_registration(raw) {
        Err(WatchError::parse_with_content(
            "WHOIS response reports no registration",
            excerpt,
        ))
    } else {
        Err(WatchError::parse_with_content(
            "WHOIS response has no expiration field",
            excerpt,
        ))
    }
}

/// Common "no such domain" phrasings.
fn reports_no_registration(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    let patterns = [
        "no match",
        "not found",
        "no data found",
        "no entries found",
        "status: free",
        "status: available",
        "no object found",
    ];

    patterns.iter().any(|pattern| lower.contains(pattern))
}

/// Check if the WHOIS output indicates rate limiting.
///
/// Answers that carry an expiry field are never rate limited, whatever
/// boilerplate surrounds it.
fn is_rate_limited(output: &str) -> bool {
    if parse_whois_expiration(output).is_ok() {
        return false;
    }

    let output_lower = output.to_lowercase();
    let rate_limit_patterns = [
        "rate limit exceeded",
        "too many requests",
        "try again later",
        "quota exceeded",
        "limit exceeded",
        "throttled",
        "rate-limited",
    ];

    rate_limit_patterns
        .iter()
        .any(|pattern| output_lower.contains(pattern))
}

/// WHOIS transport backed by the system's `whois` command.
#[derive(Debug, Clone)]
pub struct SystemWhois {
    /// Deadline for one `whois` invocation
    timeout: Duration,
}

impl SystemWhois {
    /// Create a transport with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }

    /// Create a transport with a custom per-attempt timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn execute_whois_command(&self, domain: &str) -> Result<String, WatchError> {
        let output = Command::new("whois")
            .arg(domain)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                WatchError::whois(
                    domain,
                    format!(
                        "Failed to execute whois command: {}. Make sure 'whois' is installed.",
                        e
                    ),
                )
            })?;

        // whois exits non-zero for some perfectly usable answers, so the
        // output decides, not the status
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::whois(
                domain,
                format!("empty response ({}): {}", output.status, stderr.trim()),
            ));
        }

        if is_rate_limited(&stdout) {
            return Err(WatchError::rate_limited("whois", "server asked to slow down"));
        }

        Ok(stdout)
    }
}

impl Default for SystemWhois {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisTransport for SystemWhois {
    async fn lookup(&self, domain: &str) -> Result<String, WatchError> {
        validate_domain(domain)?;

        tokio::time::timeout(self.timeout, self.execute_whois_command(domain))
            .await
            .map_err(|_| WatchError::timeout("WHOIS query", self.timeout))?
    }
}

/// Retrying expiration lookup over any [`WhoisTransport`].
///
/// Transport failures are retried according to the [`RetryPolicy`]; once a
/// response arrives, failing to find or parse the expiry ends the call.
#[derive(Debug, Clone)]
pub struct WhoisRetriever<T = SystemWhois> {
    transport: T,
    policy: RetryPolicy,
}

impl WhoisRetriever<SystemWhois> {
    /// Retriever over the system `whois` command configured from `config`.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(
            SystemWhois::with_timeout(config.timeout),
            RetryPolicy::new(config.retries, config.backoff),
        )
    }
}

impl<T: WhoisTransport> WhoisRetriever<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: WhoisTransport> ExpirationSource for WhoisRetriever<T> {
    async fn fetch_expiration(&self, domain: &str) -> Result<DateTime<Utc>, WatchError> {
        let raw = self
            .policy
            .execute(domain, || self.transport.lookup(domain))
            .await?;

        let field = parse_whois_expiration(&raw)?;
        debug!(domain, expiration = %field, "WHOIS expiration field");

        parse_expiration(&field)
    }
}
