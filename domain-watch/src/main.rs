//! Domain Watch CLI Application
//!
//! Runs one monitoring pass: resolves configuration, prepares the state
//! directory, prunes state of domains that are no longer watched and checks
//! every configured domain. Meant to be started by cron or another scheduler.

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_watch_lib::{
    load_env_config, parse_duration_string, ConfigManager, DomainWatcher, WatchConfig, WatchError,
};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-watch
#[derive(Parser, Debug)]
#[command(name = "domain-watch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Notify once when watched domains become available or approach expiry")]
#[command(
    long_about = "Check every watched domain once: a DNS SOA query tells whether it is still registered, WHOIS tells when it expires.\n\nEach notification is sent at most once; state lives in one JSON file per domain, so the command is safe to run from cron as often as needed."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names to check (replaces the configured list; skips state cleanup)
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Warn when a domain expires within this many days (default: 7)
    #[arg(
        short = 't',
        long = "threshold-days",
        value_name = "DAYS",
        help_heading = "Monitoring"
    )]
    pub threshold_days: Option<i64>,

    /// Directory holding the per-domain state files (default: /data)
    #[arg(
        short = 's',
        long = "state-dir",
        value_name = "DIR",
        help_heading = "Monitoring"
    )]
    pub state_dir: Option<PathBuf>,

    /// Shell command run for every notification
    #[arg(long = "notify-command", value_name = "CMD", help_heading = "Monitoring")]
    pub notify_command: Option<String>,

    /// Max concurrent domain checks (default: 5, max: 100)
    #[arg(short = 'c', long = "concurrency", help_heading = "Performance")]
    pub concurrency: Option<usize>,

    /// WHOIS attempts per domain (default: 3)
    #[arg(short = 'r', long = "retries", help_heading = "Performance")]
    pub retries: Option<usize>,

    /// Base WHOIS backoff, e.g. "500ms", "2s" (default: 2s)
    #[arg(long = "backoff", value_name = "DURATION", help_heading = "Performance")]
    pub backoff: Option<String>,

    /// Per-operation timeout, e.g. "5s", "1m" (default: 5s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Performance")]
    pub timeout: Option<String>,

    /// DNS resolver to query instead of /etc/resolv.conf
    #[arg(long = "nameserver", value_name = "IP", help_heading = "Protocol")]
    pub nameserver: Option<IpAddr>,

    /// Config file (JSON or TOML)
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long = "print-config", help_heading = "Configuration")]
    pub print_config: bool,

    /// Show debug logging
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.debug || debug_from_env());

    if let Err(e) = run(args).await {
        error!("{}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise debug or info.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// DEBUG=true in the environment
fn debug_from_env() -> bool {
    env::var("DEBUG")
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

async fn run(args: Args) -> Result<(), WatchError> {
    let config = build_config(&args)?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&config)?;
        println!("{}", json);
        return Ok(());
    }

    // Without a state directory nothing can be read or written safely
    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .map_err(|e| {
            WatchError::file_error(
                config.state_dir.display().to_string(),
                format!("Failed to create state directory: {}", e),
            )
        })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        domains = config.domains.len(),
        state_dir = %config.state_dir.display(),
        "domain-watch starting"
    );

    let watcher = DomainWatcher::new(config);
    if prunes_stale_state(&args) {
        let removed = watcher.cleanup().await;
        if removed > 0 {
            info!(removed, "Pruned state of unwatched domains");
        }
    } else {
        debug!("Domains given on the command line, keeping other state files");
    }

    let summary = watcher.process_all().await;
    info!(
        notifications = summary.notifications,
        failed = summary.failed,
        "domain-watch finished"
    );

    Ok(())
}

/// Stale state is pruned only against the configured domain list.
fn prunes_stale_state(args: &Args) -> bool {
    args.domains.is_empty()
}

/// Resolve defaults, config file, environment and flags, in that order.
fn build_config(args: &Args) -> Result<WatchConfig, WatchError> {
    let manager = ConfigManager::new();
    let env_config = load_env_config();

    let config_path = args.config.clone().or_else(|| env_config.config_file.clone());
    let file_config = match &config_path {
        Some(path) => Some(manager.load_file(path)?),
        None => None,
    };

    let config = manager.resolve(file_config.as_ref(), &env_config)?;
    let config = apply_cli_args_to_config(config, args)?;
    manager.validate_config(&config)?;

    Ok(config)
}

/// Apply CLI flags on top of the resolved configuration.
fn apply_cli_args_to_config(
    mut config: WatchConfig,
    args: &Args,
) -> Result<WatchConfig, WatchError> {
    if !args.domains.is_empty() {
        config.domains = args.domains.clone();
    }
    if let Some(days) = args.threshold_days {
        config.threshold_days = days;
    }
    if let Some(dir) = &args.state_dir {
        config.state_dir = dir.clone();
    }
    if let Some(command) = &args.notify_command {
        config.notify_command = Some(command.clone()).filter(|c| !c.trim().is_empty());
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(backoff) = &args.backoff {
        config.backoff = parse_duration_flag("--backoff", backoff)?;
    }
    if let Some(timeout) = &args.timeout {
        config.timeout = parse_duration_flag("--timeout", timeout)?;
    }
    if let Some(nameserver) = args.nameserver {
        config.nameserver = Some(nameserver);
    }

    Ok(config)
}

fn parse_duration_flag(flag: &str, value: &str) -> Result<std::time::Duration, WatchError> {
    parse_duration_string(value).ok_or_else(|| {
        WatchError::config(format!(
            "Invalid {} '{}'. Use format like '500ms', '5s', '2m'",
            flag, value
        ))
    })
}
