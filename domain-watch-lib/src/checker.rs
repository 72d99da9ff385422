//! Per-domain state machine and run orchestration.
//!
//! This module provides the [`DomainWatcher`] that checks every configured
//! domain once: DNS decides availability, WHOIS (or a still-valid cached
//! value) supplies the expiration, and the stored flags make sure each
//! notification goes out at most once.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::concurrent::ConcurrentProcessor;
use crate::notify::{notifier_from_config, Notifier};
use crate::protocols::{AvailabilityCheck, DnsProber, ExpirationSource, WhoisRetriever};
use crate::state::StateStore;
use crate::types::{DomainState, WatchConfig};
use crate::utils::normalize_domains;

/// What one check of one domain ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOutcome {
    /// DNS reports no SOA record. `notified` is true when this check sent the
    /// availability notification.
    Available { notified: bool },

    /// Expiry is within the threshold. `notified` is true when this check
    /// sent the warning.
    Expiring { days_left: i64, notified: bool },

    /// Expiry is known and outside the threshold.
    Stable { days_left: i64 },

    /// No expiration could be obtained; state was left untouched.
    Failed,
}

impl DomainOutcome {
    /// Whether this check sent a notification.
    pub fn notified(&self) -> bool {
        matches!(
            self,
            Self::Available { notified: true } | Self::Expiring { notified: true, .. }
        )
    }
}

/// Tally of one monitoring pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub available: usize,
    pub expiring: usize,
    pub stable: usize,
    pub failed: usize,
    pub notifications: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &DomainOutcome) {
        self.checked += 1;
        if outcome.notified() {
            self.notifications += 1;
        }
        match outcome {
            DomainOutcome::Available { .. } => self.available += 1,
            DomainOutcome::Expiring { .. } => self.expiring += 1,
            DomainOutcome::Stable { .. } => self.stable += 1,
            DomainOutcome::Failed => self.failed += 1,
        }
    }
}

/// Orchestrates one monitoring pass over the configured domains.
///
/// The collaborators are trait objects so the DNS probe, the WHOIS chain and
/// the notifier can be swapped for test doubles.
///
/// # Example
///
/// ```rust,no_run
/// use domain_watch_lib::{DomainWatcher, WatchConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = WatchConfig::default()
///         .with_domains(["example.com", "example.org"])
///         .with_state_dir("/var/lib/domain-watch");
///
///     let watcher = DomainWatcher::new(config);
///     watcher.cleanup().await;
///     let summary = watcher.process_all().await;
///     println!("{} notifications sent", summary.notifications);
/// }
/// ```
#[derive(Clone)]
pub struct DomainWatcher {
    config: Arc<WatchConfig>,
    availability: Arc<dyn AvailabilityCheck>,
    expiration: Arc<dyn ExpirationSource>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
}

impl DomainWatcher {
    /// Watcher with the UDP DNS probe, the system WHOIS client and the
    /// notifier selected by `config`.
    pub fn new(config: WatchConfig) -> Self {
        let availability = Arc::new(DnsProber::from_config(&config));
        let expiration = Arc::new(WhoisRetriever::from_config(&config));
        let notifier = notifier_from_config(&config);

        Self::with_components(config, availability, expiration, notifier)
    }

    /// Watcher with explicit collaborators.
    pub fn with_components(
        config: WatchConfig,
        availability: Arc<dyn AvailabilityCheck>,
        expiration: Arc<dyn ExpirationSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = StateStore::new(config.state_dir.clone());
        Self {
            config: Arc::new(config),
            availability,
            expiration,
            notifier,
            store,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Remove state of domains that are no longer configured.
    ///
    /// Must finish before [`process_all`](Self::process_all) starts.
    pub async fn cleanup(&self) -> usize {
        self.store.cleanup(&self.config.domains).await.len()
    }

    /// Check every configured domain once, at most `concurrency` at a time.
    ///
    /// Blank entries are skipped and duplicates are checked once. Returns
    /// after every domain task has finished; a failing or panicking task
    /// never stops its siblings.
    pub async fn process_all(&self) -> RunSummary {
        let domains = normalize_domains(&self.config.domains);
        let pool = ConcurrentProcessor::new(self.config.concurrency);
        info!(
            domains = domains.len(),
            concurrency = pool.max_concurrency(),
            "Starting monitoring pass"
        );

        let outcomes = pool
            .run(domains, |domain| {
                let watcher = self.clone();
                async move { watcher.process_domain(&domain).await }
            })
            .await;

        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            summary.record(outcome);
        }

        info!(
            checked = summary.checked,
            available = summary.available,
            expiring = summary.expiring,
            stable = summary.stable,
            failed = summary.failed,
            notifications = summary.notifications,
            "Monitoring pass finished"
        );
        summary
    }

    /// Check one domain against the current time.
    pub async fn process_domain(&self, domain: &str) -> DomainOutcome {
        self.process_domain_at(domain, Utc::now()).await
    }

    /// Check one domain as of `now`.
    pub async fn process_domain_at(&self, domain: &str, now: DateTime<Utc>) -> DomainOutcome {
        let domain = domain.trim();
        let mut state = self.store.load(domain).await;
        info!(domain, "Checking {}", domain);

        match self.availability.is_available(domain).await {
            Ok(true) => {
                info!(domain, "→ {} is available", domain);
                return self.handle_available(domain, state).await;
            }
            Ok(false) => debug!(domain, "SOA record present"),
            // An error never means available
            Err(e) => warn!(domain, error = %e, "DNS check failed"),
        }

        if !state.has_valid_expiration(now) {
            let expiration = match self.expiration.fetch_expiration(domain).await {
                Ok(expiration) => expiration,
                Err(e) => {
                    warn!(domain, error = %e, "Could not determine expiration");
                    return DomainOutcome::Failed;
                }
            };

            info!(domain, "→ {} expires at {}", domain, expiration.to_rfc3339());
            if state.expiration != Some(expiration) {
                if state.notified_expiry {
                    info!(domain, "Expiration changed, re-arming expiry warning");
                }
                state.notified_expiry = false;
            }
            state.expiration = Some(expiration);
            self.store.save(domain, &state).await;
        } else {
            debug!(domain, "Using cached expiration");
        }

        self.handle_expiry(domain, state, now).await
    }

    async fn handle_available(&self, domain: &str, mut state: DomainState) -> DomainOutcome {
        if state.notified_available {
            debug!(domain, "Availability already notified");
            return DomainOutcome::Available { notified: false };
        }

        self.notifier
            .send(domain, &format!("Domain {} is now available!", domain))
            .await;
        state.notified_available = true;
        self.store.save(domain, &state).await;

        DomainOutcome::Available { notified: true }
    }

    async fn handle_expiry(
        &self,
        domain: &str,
        mut state: DomainState,
        now: DateTime<Utc>,
    ) -> DomainOutcome {
        let Some(days_left) = state.days_until_expiry(now) else {
            return DomainOutcome::Failed;
        };

        if days_left > self.config.threshold_days {
            debug!(domain, days_left, "Outside expiry threshold");
            return DomainOutcome::Stable { days_left };
        }

        if state.notified_expiry {
            debug!(domain, days_left, "Expiry already notified");
            return DomainOutcome::Expiring {
                days_left,
                notified: false,
            };
        }

        self.notifier
            .send(
                domain,
                &format!("Domain {} expires in {} days", domain, days_left),
            )
            .await;
        state.notified_expiry = true;
        self.store.save(domain, &state).await;

        DomainOutcome::Expiring {
            days_left,
            notified: true,
        }
    }
}
