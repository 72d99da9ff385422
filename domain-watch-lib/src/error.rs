//! Error handling for domain monitoring operations.
//!
//! This module defines a single error type that covers every way a monitoring
//! pass can fail, from DNS socket errors to unreadable state files.

use std::fmt;
use std::time::Duration;

/// Main error type for domain monitoring operations.
///
/// Nothing in a monitoring pass is fatal per domain: callers log these and
/// move on. The variants exist so logs and retry decisions can tell a
/// transport failure from a parse failure.
#[derive(Debug, Clone)]
pub enum WatchError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Network-related errors (socket creation, send, receive)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// DNS response could not be used to answer the availability question
    DnsError { domain: String, message: String },

    /// WHOIS transport or lookup failures
    WhoisError { domain: String, message: String },

    /// Malformed DNS replies, unparseable WHOIS text or dates
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, unreadable config file)
    ConfigError { message: String },

    /// File I/O errors on the state directory
    FileError { path: String, message: String },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// WHOIS servers refusing to answer because of rate limits
    RateLimited { service: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl WatchError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new DNS error.
    pub fn dns<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::DnsError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new WHOIS error.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseError {
            message: message.into(),
            content: None,
        }
    }

    /// Create a new parse error that keeps the offending input.
    pub fn parse_with_content<M: Into<String>, C: Into<String>>(message: M, content: C) -> Self {
        Self::ParseError {
            message: message.into(),
            content: Some(content.into()),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new rate limit error.
    pub fn rate_limited<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::RateLimited {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error suggests the operation should be retried.
    ///
    /// Only transport-level failures qualify. A response that arrived but
    /// could not be parsed will not parse any better the second time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::WhoisError { .. }
        )
    }
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::DnsError { domain, message } => {
                write!(f, "DNS error for '{}': {}", domain, message)
            }
            Self::WhoisError { domain, message } => {
                write!(f, "WHOIS error for '{}': {}", domain, message)
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::RateLimited { service, message } => {
                write!(f, "Rate limited by {}: {}", service, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for WatchError {}

// Implement From conversions for common error types
impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<toml::de::Error> for WatchError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<std::io::Error> for WatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(WatchError::network("connection refused").is_retryable());
        assert!(WatchError::timeout("WHOIS query", Duration::from_secs(5)).is_retryable());
        assert!(WatchError::rate_limited("whois", "try again later").is_retryable());
        assert!(WatchError::whois("example.com", "exit status 2").is_retryable());
    }

    #[test]
    fn test_content_errors_are_not_retryable() {
        assert!(!WatchError::parse("no expiration field").is_retryable());
        assert!(!WatchError::invalid_domain("-x", "leading hyphen").is_retryable());
        assert!(!WatchError::config("bad").is_retryable());
        assert!(!WatchError::dns("example.com", "SERVFAIL").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = WatchError::dns("example.com", "reply too short");
        assert_eq!(err.to_string(), "DNS error for 'example.com': reply too short");

        let err = WatchError::network_with_source("send failed", "broken pipe");
        assert_eq!(
            err.to_string(),
            "Network error: send failed (source: broken pipe)"
        );

        let err = WatchError::timeout("DNS query", Duration::from_secs(5));
        assert_eq!(err.to_string(), "Timeout after 5s during: DNS query");
    }
}
