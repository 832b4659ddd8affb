//! ascan - active scan engine
//!
//! Replays a recorded site tree with attack payloads and writes a report
//! of the alerts raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ascan::app::Config;
use ascan::http::ReqwestSender;
use ascan::model::{SiteEntry, SiteTree};
use ascan::reporting::{ReportFormat, ReportMetadata, ScanReport};
use ascan::scanner::active::builtin_registry;
use ascan::scanner::{ScanPolicy, Scanner, ScannerListener, UrlRegexFilter};
use ascan::scope::{Scope, ScopePattern};
use ascan::UserHint;

/// Active web application scanner
#[derive(Parser, Debug)]
#[command(name = "ascan")]
#[command(author, version, about = "Active web application scanner", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ASCAN_CONFIG")]
    config: Option<String>,

    /// JSON file with the recorded requests to scan
    #[arg(short, long, env = "ASCAN_SITE_TREE", required_unless_present = "generate_config")]
    site_tree: Option<PathBuf>,

    /// Scan policy (standard, quick, full, api)
    #[arg(short, long, env = "ASCAN_POLICY")]
    policy: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "markdown", env = "ASCAN_FORMAT")]
    format: ReportFormat,

    /// Report file (stdout when absent)
    #[arg(short, long, env = "ASCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Only scan URLs under these targets
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Skip URLs matching this regex (repeatable)
    #[arg(long = "exclude-url")]
    exclude_urls: Vec<String>,

    /// Hosts scanned concurrently
    #[arg(long, env = "ASCAN_HOSTS")]
    hosts: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ASCAN_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, env = "ASCAN_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, env = "ASCAN_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        return generate_default_config();
    }

    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ascan");

    let config = load_config(&cli)?;

    if cli.validate_config {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    run_scan(cli, config).await
}

/// Initialize the logging system
///
/// Console output goes to stderr so a report written to stdout stays clean.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        // File-based logging with rotation
        let file_appender = if log_path.contains('/') || log_path.contains('\\') {
            let path = Path::new(log_path);
            let dir = path.parent().unwrap_or(Path::new("."));
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("ascan.log");
            RollingFileAppender::new(Rotation::DAILY, dir, filename)
        } else {
            let log_dir = Config::data_dir()
                .map(|d| d.join("logs"))
                .unwrap_or_else(|_| PathBuf::from("."));
            std::fs::create_dir_all(&log_dir).ok();
            RollingFileAppender::new(Rotation::DAILY, log_dir, log_path)
        };

        if cli.log_json {
            let file_layer = fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_ansi(false);
            subscriber.with(file_layer).init();
        } else {
            let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        }
    } else if cli.log_json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(policy) = &cli.policy {
        config.policy.name = policy.clone();
    }
    if let Some(hosts) = cli.hosts {
        config.scanner.hosts_per_scan = hosts;
    }
    if !cli.targets.is_empty() {
        config.scanner.in_scope_only = true;
    }

    if let Err(e) = config.validate() {
        tracing::error!("{}", e.user_hint());
        return Err(e.into());
    }

    Ok(config)
}

/// Generate default configuration file
fn generate_default_config() -> Result<()> {
    let config = Config::default();
    let toml = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!("{}", toml);
    Ok(())
}

fn load_site_tree(path: &Path) -> Result<SiteTree> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read site tree from {:?}", path))?;
    let entries: Vec<SiteEntry> =
        serde_json::from_str(&contents).with_context(|| "Failed to parse site tree")?;
    let tree = SiteTree::from_entries(&entries)?;
    tracing::info!(
        "Loaded {} requests on {} hosts from {:?}",
        entries.len(),
        tree.hosts().len(),
        path
    );
    Ok(tree)
}

fn build_scope(cli: &Cli) -> Result<Scope> {
    let mut scope = Scope::new();
    for target in &cli.targets {
        scope
            .add_target_url(target)
            .with_context(|| format!("Invalid target {}", target))?;
    }
    for pattern in &cli.exclude_urls {
        scope.add_exclude(ScopePattern::regex(pattern)?);
    }
    Ok(scope)
}

/// Logs host progress as the scan goes
struct ProgressLogger;

impl ScannerListener for ProgressLogger {
    fn host_progress(&self, host: &str, status: Option<&str>, percentage: u8) {
        tracing::debug!("{} {}% {}", host, percentage, status.unwrap_or(""));
    }

    fn host_complete(&self, host: &str) {
        tracing::info!("Host {} complete", host);
    }

    fn filtered_message(&self, msg: &ascan::http::HttpMessage, reason: &str) {
        tracing::debug!("Filtered {}: {}", msg.uri(), reason);
    }
}

/// Run the scan and write the report
async fn run_scan(cli: Cli, config: Config) -> Result<()> {
    let site_tree = cli
        .site_tree
        .as_deref()
        .context("A site tree file is required")?;
    let tree = Arc::new(load_site_tree(site_tree)?);
    let start_nodes = tree.hosts().to_vec();

    let policy = ScanPolicy::from_config(&config.policy, &config.plugin_store());
    let registry = builtin_registry();
    let factory = policy.create_factory(&registry);

    let sender = Arc::new(ReqwestSender::new(&config.http)?);
    let scanner = Arc::new(
        Scanner::new(config.scanner.clone(), sender, factory).with_scope(build_scope(&cli)?),
    );
    for pattern in &cli.exclude_urls {
        scanner.add_filter(Arc::new(UrlRegexFilter::new(pattern)?));
    }
    scanner.add_listener(Arc::new(ProgressLogger));

    let mut metadata = ReportMetadata {
        target: site_tree.display().to_string(),
        policy: policy.name.clone(),
        ..Default::default()
    };

    scanner.start(tree, &start_nodes)?;

    // The engine blocks on its worker threads; keep the runtime free for transport
    let waiter = scanner.clone();
    let mut wait = tokio::task::spawn_blocking(move || waiter.wait_for_completion());
    tokio::select! {
        result = &mut wait => result?,
        _ = signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, stopping scan");
            scanner.stop();
            wait.await?;
        }
    }

    metadata.end_time = chrono::Utc::now();
    let report = ScanReport::new(scanner.alerts(), metadata);
    tracing::info!(
        "Scan finished in {:?} with {} alerts",
        scanner.elapsed(),
        report.summary.total_alerts
    );

    match &cli.output {
        Some(path) => report.save(path, cli.format)?,
        None => println!("{}", report.render(cli.format)?),
    }

    Ok(())
}
