//! DriftSync - Multi-Source Document Store Reconciliation Manager
//!
//! Binary entry point: loads the topology from TOML, connects a client per
//! node, waits for the cluster to answer pings, then runs reconciliation
//! cycles on a fixed interval until shut down.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driftsync::config::SyncConfig;
use driftsync::error::Result;
use driftsync::node::{MariaDbNode, NodeClient};
use driftsync::retry::RetryPolicy;
use driftsync::sync::{PrimarySource, SyncCycle};

/// DriftSync - Multi-Source Document Store Reconciliation Manager
#[derive(Parser)]
#[command(name = "driftsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "driftsync.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation cycles on the configured interval
    Run,

    /// Run a single reconciliation cycle and exit
    Once,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "driftsync.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run => run(cli.config, false).await,
        Commands::Once => run(cli.config, true).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the reconciler, either once or on the configured interval
async fn run(config_path: PathBuf, once: bool) -> Result<()> {
    tracing::info!("Starting DriftSync...");

    let config = match SyncConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    tracing::info!(
        "Loaded topology: {} primaries, {} replicas, collection '{}'",
        config.cluster.primaries.len(),
        config.cluster.replicas.len(),
        config.cluster.collection
    );

    let cycle = connect_topology(&config).await?;

    // Readiness gate: provisioning guarantees the nodes exist, this waits
    // out their startup before the first cycle may run.
    let policy = RetryPolicy::from(&config.retry);
    cycle.wait_until_ready(policy, config.ping_timeout()).await?;
    tracing::info!("All nodes ready");

    if once {
        let report = cycle.run().await;
        for unit in &report.units {
            println!("{unit}");
        }
        return Ok(());
    }

    // One cycle in flight at a time; a tick that fires while the previous
    // cycle is still running is skipped, not queued.
    let mut interval = tokio::time::interval(config.interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::info!("Reconciling every {:?}", config.interval());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = cycle.run().await;
                if !report.is_success() {
                    for unit in report.failures() {
                        tracing::warn!("unit failed: {unit}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    tracing::info!("DriftSync shutdown complete");
    Ok(())
}

/// Connect a client per configured node and assemble the cycle
async fn connect_topology(config: &SyncConfig) -> Result<SyncCycle> {
    let policy = RetryPolicy::from(&config.retry);
    let timeout = config.connect_timeout();

    let mut primaries = Vec::with_capacity(config.cluster.primaries.len());
    for primary in &config.cluster.primaries {
        let address = primary.address();
        tracing::info!("Connecting to primary {} at {}...", primary.name, address);
        let node = policy
            .run(&format!("connect {}", primary.name), || {
                MariaDbNode::connect(&primary.name, address.clone(), &config.credentials, timeout)
            })
            .await?;
        node.ensure_collection(&primary.database, &config.cluster.collection)
            .await?;
        primaries.push(PrimarySource {
            node: Arc::new(node) as Arc<dyn NodeClient>,
            database: primary.database.clone(),
        });
    }

    let mut replicas: Vec<Arc<dyn NodeClient>> = Vec::with_capacity(config.cluster.replicas.len());
    for replica in &config.cluster.replicas {
        let address = replica.address();
        tracing::info!("Connecting to replica {} at {}...", replica.name, address);
        let node = policy
            .run(&format!("connect {}", replica.name), || {
                MariaDbNode::connect(&replica.name, address.clone(), &config.credentials, timeout)
            })
            .await?;
        // Replicas hold the union of every dataset.
        for database in config.databases() {
            node.ensure_collection(&database, &config.cluster.collection)
                .await?;
        }
        replicas.push(Arc::new(node) as Arc<dyn NodeClient>);
    }

    Ok(SyncCycle::new(
        primaries,
        replicas,
        config.cluster.collection.clone(),
    ))
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# DriftSync Configuration
# Generated configuration file

[cluster]
collection = "users"

[[cluster.primaries]]
name = "node1"
host = "doc-node1"
port = 3306
database = "appdb1"

[[cluster.primaries]]
name = "node2"
host = "doc-node2"
port = 3306
database = "appdb2"

[[cluster.replicas]]
name = "replica1"
host = "doc-replica1"
port = 3306

[[cluster.replicas]]
name = "replica2"
host = "doc-replica2"
port = 3306

[[cluster.replicas]]
name = "replica3"
host = "doc-replica3"
port = 3306

[credentials]
user = "driftsync"
password = "changeme"

[sync]
interval_secs = 30
connect_timeout_secs = 5
ping_timeout_ms = 2000

[retry]
max_attempts = 30
base_delay_ms = 500

[logging]
level = "info"
format = "pretty"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure your cluster topology and credentials.");
    println!("Then start with: driftsync run --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match SyncConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            for primary in &config.cluster.primaries {
                println!(
                    "  Primary: {} at {} owning {}",
                    primary.name,
                    primary.address(),
                    primary.database
                );
            }
            for replica in &config.cluster.replicas {
                println!("  Replica: {} at {}", replica.name, replica.address());
            }
            println!("  Collection: {}", config.cluster.collection);
            println!("  Interval: {:?}", config.interval());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}
