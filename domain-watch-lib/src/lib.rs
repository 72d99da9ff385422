//! # Domain Watch Library
//!
//! Periodic domain availability and expiry monitoring with one-time
//! notifications.
//!
//! Every run checks each configured domain once. A hand-built DNS SOA query
//! decides whether the domain is still registered; WHOIS supplies its
//! expiration when no still-valid value is cached. Per-domain JSON state files
//! make the run safe to repeat as often as a scheduler likes: each
//! notification is sent at most once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_watch_lib::{DomainWatcher, WatchConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = WatchConfig::default()
//!         .with_domains(["example.com"])
//!         .with_threshold_days(30);
//!
//!     let watcher = DomainWatcher::new(config);
//!     watcher.cleanup().await;
//!     watcher.process_all().await;
//! }
//! ```
//!
//! ## Features
//!
//! - **DNS probe**: minimal UDP wire format, SOA answer count decides availability
//! - **WHOIS lookup**: system `whois` with exponential backoff and jitter
//! - **Idempotent notifications**: flags persisted per domain
//! - **Bounded concurrency**: semaphore-guarded worker pool
//! - **Safe cleanup**: only files this library wrote are ever deleted

// Re-export main public API types and functions
// This makes them available as domain_watch_lib::TypeName
pub use checker::{DomainOutcome, DomainWatcher, RunSummary};
pub use concurrent::ConcurrentProcessor;
pub use config::{
    load_env_config, load_env_config_from, parse_duration_string, ConfigManager, DurationUnit,
    DurationValue, EnvConfig, FileConfig,
};
pub use error::WatchError;
pub use expiration::parse_expiration;
pub use notify::{notifier_from_config, CommandNotifier, LogNotifier, Notifier};
pub use protocols::{
    build_query, parse_whois_expiration, AvailabilityCheck, DnsHeader, DnsProber,
    ExpirationSource, SystemWhois, WhoisRetriever, WhoisTransport,
};
pub use retry::RetryPolicy;
pub use state::StateStore;
pub use types::{DomainState, WatchConfig};
pub use utils::{normalize_domains, state_key, validate_domain};

// Public modules
pub mod protocols;

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod expiration;
mod notify;
mod retry;
mod state;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, WatchError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
