//! Protocol implementations for domain monitoring.
//!
//! This module contains the DNS availability probe and the WHOIS expiration
//! lookup, plus the small capability traits the orchestrator is built on so
//! either side can be swapped for a different implementation or a test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::WatchError;

/// Minimal DNS wire format and the SOA availability probe
pub mod dns;

/// WHOIS transport, text parsing and the retrying expiration lookup
pub mod whois;

// Re-export commonly used functions and types
pub use dns::{build_query, DnsHeader, DnsProber};
pub use whois::{parse_whois_expiration, SystemWhois, WhoisRetriever};

/// Answers "is this domain unregistered?".
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    /// `Ok(true)` when the domain has no SOA record. Errors mean "unknown".
    async fn is_available(&self, domain: &str) -> Result<bool, WatchError>;
}

/// Produces a fresh registration expiry for a domain.
#[async_trait]
pub trait ExpirationSource: Send + Sync {
    async fn fetch_expiration(&self, domain: &str) -> Result<DateTime<Utc>, WatchError>;
}

/// Raw WHOIS lookup primitive.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    /// Return the raw WHOIS response text for `domain`.
    async fn lookup(&self, domain: &str) -> Result<String, WatchError>;
}
