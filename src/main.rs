//! service-sentinel - fleet health monitor
//!
//! # Usage
//!
//! ```bash
//! # Run the monitor against the services in fleet.toml
//! service-sentinel run
//!
//! # One-off views
//! service-sentinel probe --service 3
//! service-sentinel recommend
//! service-sentinel predict --service 3
//!
//! # Validate a config file
//! service-sentinel check-config sentinel.toml
//! ```
//!
//! # Environment Variables
//!
//! - `SENTINEL_CONFIG`: Path to the config file (default: ./sentinel.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use service_sentinel::config::{self, validation, SentinelConfig};
use service_sentinel::registry::fleet_file::FleetFile;
use service_sentinel::{
    HealthIntelligence, InMemoryRegistry, MonitorScheduler, PortEvent, Registry, ShellInspector, StatusProbe,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "service-sentinel")]
#[command(about = "Service fleet health intelligence and restart control")]
#[command(version)]
struct CliArgs {
    /// Path to sentinel.toml (overrides SENTINEL_CONFIG and ./sentinel.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the fleet file (overrides [daemon] fleet_file)
    #[arg(long, global = true, value_name = "PATH")]
    fleet: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the monitor scheduler until Ctrl+C
    Run,
    /// Probe services once and print their status
    Probe {
        #[arg(long)]
        service: Option<u64>,
    },
    /// Print restart recommendations as JSON
    Recommend {
        #[arg(long)]
        service: Option<u64>,
    },
    /// Print failure predictions as JSON
    Predict {
        #[arg(long)]
        service: Option<u64>,
    },
    /// Load and validate a config file
    CheckConfig {
        path: Option<PathBuf>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json);

    if let Command::CheckConfig { path } = &args.command {
        let path = path.clone().or_else(|| args.config.clone()).unwrap_or_else(|| PathBuf::from("sentinel.toml"));
        return check_config(&path);
    }

    let cfg = match &args.config {
        Some(path) => SentinelConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SentinelConfig::load(),
    };
    config::init(cfg);
    let cfg = config::get();

    let fleet_path = args.fleet.clone().unwrap_or_else(|| cfg.daemon.fleet_file.clone());
    let registry = Arc::new(load_fleet(&fleet_path)?);

    match args.command {
        Command::Run => run(registry, cfg).await,
        Command::Probe { service } => probe(registry, cfg, service).await,
        Command::Recommend { service } => recommend(registry, cfg, service).await,
        Command::Predict { service } => predict(registry, cfg, service).await,
        Command::CheckConfig { .. } => Ok(()),
    }
}

fn load_fleet(path: &Path) -> Result<InMemoryRegistry> {
    let fleet = FleetFile::load(path).with_context(|| format!("Failed to load fleet file {}", path.display()))?;
    info!(path = %path.display(), services = fleet.services.len(), "Fleet loaded");
    Ok(fleet.into_registry())
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run(registry: Arc<InMemoryRegistry>, cfg: &SentinelConfig) -> Result<()> {
    let inspector = Arc::new(ShellInspector::new(Duration::from_millis(cfg.control.inspector_timeout_ms)));
    let scheduler = MonitorScheduler::new(registry.clone(), inspector, cfg).context("Failed to build scheduler")?;
    let intelligence = HealthIntelligence::new(registry.clone(), cfg);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    let mut port_events = scheduler.subscribe();
    let port_token = cancel_token.clone();
    let port_logger = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = port_token.cancelled() => break,
                event = port_events.recv() => match event {
                    Ok(PortEvent::Occupied { port, pid, process_name }) => {
                        info!(port, pid, process = %process_name, "Port occupied");
                    }
                    Ok(PortEvent::Released { port }) => info!(port, "Port released"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Port event receiver lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    scheduler.start().await.context("Failed to start scheduler")?;
    info!(simulation = cfg.control.simulation, "Service sentinel running");

    let mut report = tokio::time::interval(Duration::from_secs(cfg.daemon.report_interval_secs.max(1)));
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = report.tick() => report_recommendations(&intelligence).await,
        }
    }

    scheduler.stop().await;
    port_logger.await.ok();
    info!("Service sentinel shutdown complete");
    Ok(())
}

async fn report_recommendations(intelligence: &HealthIntelligence) {
    match intelligence.get_all_recommendations().await {
        Ok(recs) if recs.is_empty() => info!("No restart recommendations"),
        Ok(recs) => {
            for rec in recs.iter().take(5) {
                info!(
                    service = %rec.service_name,
                    score = rec.score,
                    urgency = %rec.urgency,
                    window = %rec.recommended_time_window,
                    "{}",
                    rec.reason
                );
            }
        }
        Err(e) => warn!(error = %e, "Failed to compute recommendations"),
    }
}

async fn probe(registry: Arc<InMemoryRegistry>, cfg: &SentinelConfig, service: Option<u64>) -> Result<()> {
    let probe = StatusProbe::new(&cfg.probe).context("Failed to build HTTP client")?;
    let services = registry.list_services().await?;
    for svc in services.iter().filter(|s| service.map_or(true, |id| id == s.id)) {
        let status = probe.probe(svc).await;
        let line = serde_json::json!({ "id": svc.id, "name": svc.name, "status": status });
        println!("{line}");
    }
    Ok(())
}

async fn recommend(registry: Arc<InMemoryRegistry>, cfg: &SentinelConfig, service: Option<u64>) -> Result<()> {
    let intelligence = HealthIntelligence::new(registry, cfg);
    let json = match service {
        Some(id) => serde_json::to_string_pretty(&intelligence.get_recommendation(id).await?)?,
        None => serde_json::to_string_pretty(&intelligence.get_all_recommendations().await?)?,
    };
    println!("{json}");
    Ok(())
}

async fn predict(registry: Arc<InMemoryRegistry>, cfg: &SentinelConfig, service: Option<u64>) -> Result<()> {
    let intelligence = HealthIntelligence::new(registry, cfg);
    let json = match service {
        Some(id) => serde_json::to_string_pretty(&intelligence.generate_prediction(id).await?)?,
        None => serde_json::to_string_pretty(&intelligence.get_all_predictions().await?)?,
    };
    println!("{json}");
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    for warning in validation::validate_unknown_keys(&contents) {
        println!("warning: {warning}");
    }
    SentinelConfig::parse(&contents).with_context(|| format!("Invalid config {}", path.display()))?;
    println!("{} is valid", path.display());
    Ok(())
}
