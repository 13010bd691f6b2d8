//! Balance Monitor - Main Entry Point

use anyhow::{Context, Result};
use balance_monitor::config::Config;
use balance_monitor::exchange::BalanceClient;
use balance_monitor::limits::{CsvLimitSource, LimitRegistry, LimitSource, LimitTable};
use balance_monitor::monitor::{shutdown_on_signal, CycleOutcome, PollLoop};
use balance_monitor::notify::{AlertSink, LogSink, SlackNotifier};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Balance Monitor CLI
#[derive(Parser)]
#[command(name = "balance-monitor")]
#[command(version, about = "Exchange balance threshold monitor with chat alerts")]
struct Cli {
    /// Path to a config file (default: optional ./config.*)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor loop until interrupted (default)
    Run,

    /// Run a single fetch/evaluate/notify cycle and exit
    Check {
        /// Log alerts instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the limits file and report inverted ranges
    Limits {
        /// Limits CSV to check (default: limits.path from config)
        #[arg(short, long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Limits { path }) => {
            let path = match path {
                Some(p) => p,
                None => Config::load(cli.config.as_deref())?.limits.path,
            };
            check_limits(&path)
        }
        Some(Commands::Check { dry_run }) => {
            let config = load_config(cli.config.as_deref())?;
            run_once(&config, dry_run).await
        }
        Some(Commands::Run) | None => {
            let config = load_config(cli.config.as_deref())?;
            run_monitor(&config).await
        }
    }
}

/// Load and validate configuration. Any problem is fatal.
fn load_config(path: Option<&str>) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate().context("Invalid configuration")?;
    log_config(&config);
    Ok(config)
}

/// Build the poll loop from configuration.
fn build_loop(config: &Config, sink: Arc<dyn AlertSink>) -> Result<(PollLoop, Arc<LimitRegistry>)> {
    let source = Arc::new(CsvLimitSource::new(&config.limits.path));
    let registry = Arc::new(
        LimitRegistry::load(source, config.limits.refresh_ttl())
            .context("Failed to load balance limits")?,
    );

    let client = BalanceClient::new(&config.ledger, config.monitor.request_timeout())?;

    let poll = PollLoop::new(
        Arc::new(client),
        registry.clone(),
        sink,
        config.monitor.poll_interval(),
    );
    Ok((poll, registry))
}

async fn run_monitor(config: &Config) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║           Balance Monitor v{}                          ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let sink = Arc::new(SlackNotifier::new(
        &config.slack,
        config.monitor.request_timeout(),
    )?);
    let (poll, registry) = build_loop(config, sink)?;

    // Shutdown signal; a second Ctrl-C skips waiting for the cycle in flight
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if shutdown_on_signal(tokio::signal::ctrl_c, shutdown).await {
            std::process::exit(130);
        }
    });

    let refresher = registry.spawn_refresher(config.limits.refresh_check(), cancel.clone());

    poll.run(cancel.clone()).await;

    cancel.cancel();
    refresher.await.ok();

    info!("Script Closing: You are now on your own");
    Ok(())
}

async fn run_once(config: &Config, dry_run: bool) -> Result<()> {
    let sink: Arc<dyn AlertSink> = if dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(SlackNotifier::new(
            &config.slack,
            config.monitor.request_timeout(),
        )?)
    };
    let (poll, _) = build_loop(config, sink)?;

    match poll.run_cycle().await {
        CycleOutcome::NoData { status } => warn!("No balance data (status {})", status),
        CycleOutcome::AllInRange { checked } => info!("{} balances checked, all in range", checked),
        CycleOutcome::Alerted { violations } => info!("{} warnings sent", violations),
        CycleOutcome::AlertFailed { violations } => {
            anyhow::bail!("{} warnings could not be delivered", violations)
        }
    }
    Ok(())
}

fn check_limits(path: &str) -> Result<()> {
    let table: LimitTable = CsvLimitSource::new(path)
        .load()
        .with_context(|| format!("Failed to load limits from {}", path))?;

    info!("📋 {} limit entries in {}", table.len(), path);

    let inverted = table.inverted_entries();
    if inverted.is_empty() {
        info!("✅ No inverted ranges");
        return Ok(());
    }

    for (key, entry) in &inverted {
        warn!(
            "⚠️  {}/{}: lower {:?} > upper {:?}, balances will be flagged both below and above",
            key.platform, key.currency, entry.lower, entry.upper
        );
    }
    anyhow::bail!("{} inverted limit ranges found", inverted.len())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "balance-monitor.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("balance_monitor=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Ledger Host: {}", config.ledger.host);
    info!("   Alert Channel: {}", config.slack.channel);
    info!("   Bot Name: {}", config.slack.user_name);
    info!("   Poll Interval: {}s", config.monitor.poll_interval_secs);
    info!("   Request Timeout: {}s", config.monitor.request_timeout_secs);
    info!("   Limits File: {}", config.limits.path);
    info!(
        "   Limits Refresh: every {}h",
        config.limits.refresh_ttl_secs / 3600
    );
}
