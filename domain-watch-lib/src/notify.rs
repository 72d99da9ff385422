//! Notification delivery.
//!
//! Notifications are fire-and-forget: a notifier logs its own failures and
//! never reports them back to the state machine.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::types::WatchConfig;

/// Environment variable carrying the domain to the notify command.
pub const DOMAIN_ENV: &str = "DOMAIN_WATCH_DOMAIN";
/// Environment variable carrying the message to the notify command.
pub const MESSAGE_ENV: &str = "DOMAIN_WATCH_MESSAGE";

/// Delivers one notification about one domain.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, domain: &str, message: &str);
}

/// Writes every notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, domain: &str, message: &str) {
        info!(domain, "NOTIFY: {}", message);
    }
}

/// Runs a shell command for every notification.
///
/// The command sees the domain and message in `DOMAIN_WATCH_DOMAIN` and
/// `DOMAIN_WATCH_MESSAGE`. It is killed when it outlives `timeout`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new<S: Into<String>>(command: S, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(&self, domain: &str, message: &str) -> Result<(), String> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(DOMAIN_ENV, domain)
            .env(MESSAGE_ENV, message)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))?
            .map_err(|e| format!("failed to start: {}", e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("{}: {}", output.status, stderr.trim()))
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send(&self, domain: &str, message: &str) {
        info!(domain, "NOTIFY: {}", message);

        match self.run(domain, message).await {
            Ok(()) => debug!(domain, "Notify command succeeded"),
            Err(e) => warn!(domain, error = %e, "Notify command failed"),
        }
    }
}

/// Pick the notifier the configuration asks for.
pub fn notifier_from_config(config: &WatchConfig) -> Arc<dyn Notifier> {
    match config.notify_command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            Arc::new(CommandNotifier::new(command, config.timeout))
        }
        _ => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_notifier_never_fails() {
        tokio_test::block_on(LogNotifier.send("example.com", "Domain example.com is now available!"));
    }

    #[tokio::test]
    async fn test_command_notifier_passes_domain_and_message() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("notified.txt");
        let command = format!(
            "printf '%s|%s' \"${}\" \"${}\" > '{}'",
            DOMAIN_ENV,
            MESSAGE_ENV,
            out.display()
        );

        CommandNotifier::new(command, Duration::from_secs(5))
            .send("example.com", "Domain example.com expires in 3 days")
            .await;

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "example.com|Domain example.com expires in 3 days");
    }

    #[tokio::test]
    async fn test_command_notifier_reports_failures() {
        let notifier = CommandNotifier::new("echo boom >&2; exit 3", Duration::from_secs(5));
        let err = notifier.run("example.com", "msg").await.unwrap_err();
        assert!(err.contains("boom"), "{}", err);

        // send swallows the failure
        notifier.send("example.com", "msg").await;
    }

    #[tokio::test]
    async fn test_command_notifier_times_out() {
        let notifier = CommandNotifier::new("sleep 5", Duration::from_millis(100));
        let started = std::time::Instant::now();

        let err = notifier.run("example.com", "msg").await.unwrap_err();
        assert!(err.contains("timed out"), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_notifier_from_config() {
        // Only checks that both branches build; trait objects hide the type.
        let _log = notifier_from_config(&WatchConfig::default());
        let _log_blank = notifier_from_config(&WatchConfig::default().with_notify_command("  "));
        let _cmd = notifier_from_config(&WatchConfig::default().with_notify_command("true"));
    }
}
