mod gui;

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use fabric_sim::{
    config::{Config, LoggingConfig},
    network::{ConfigurationError, NodeId},
    output,
    overlay::{OverlayError, SegmentId},
    simulation::{self, ErrorReport, Simulation, SimulationError},
    topology::{SnapshotStore, TopologySource, source::select_source},
};

use crate::gui::app::DashboardContext;

/// Spine-leaf underlay and VXLAN overlay simulator
#[derive(Parser)]
#[command(name = "fabric-sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compute OSPF-style routing tables and VXLAN tunnels for a data center fabric")]
#[command(long_about = r#"
Builds (or loads) an underlay topology, runs a link-state shortest path computation from every
router and resolves the overlay tunnels of every segment over the resulting routing tables.

Examples:
  fabric-sim                              # Print the JSON report of the default fabric
  fabric-sim --topology lab.json routes   # Routing tables of a topology file
  fabric-sim tunnels --segment 100        # Tunnels of VNI 100
  fabric-sim watch --interval 2           # Recompute whenever the topology changes
"#)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "FABRIC_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// JSON or TOML topology file, replaces the generated spine-leaf fabric
    #[arg(short, long, env = "FABRIC_SIM_TOPOLOGY")]
    topology: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full simulation report as JSON
    Simulate {
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print routing tables
    Routes {
        /// Only this router
        #[arg(short, long)]
        router: Option<String>,
    },

    /// Print overlay tunnels
    Tunnels {
        /// Only this segment (VNI)
        #[arg(short, long)]
        segment: Option<u32>,
    },

    /// Poll the topology and print a report line whenever the result changes
    Watch {
        /// Seconds between polls, defaults to the configured interval
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many polls
        #[arg(short = 'n', long)]
        iterations: Option<u64>,
    },

    /// Open the desktop dashboard
    Dashboard,
}

fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            return fail(&anyhow::Error::from(SimulationError::from(e)));
        }
    };
    init_logging(&config.logging);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Print the error as a JSON `ErrorReport` on stderr.
fn fail(error: &anyhow::Error) -> ExitCode {
    let report = match error.downcast_ref::<SimulationError>() {
        Some(error) => error.report(),
        None => ErrorReport {
            kind: "internal".to_string(),
            message: format!("{error:#}"),
        },
    };
    tracing::error!(kind = %report.kind, "{}", report.message);
    match serde_json::to_string(&report) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}: {}", report.kind, report.message),
    }
    ExitCode::FAILURE
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let runtime = Arc::new(Runtime::new().context("failed to start the tokio runtime")?);
    let mut source = select_source(cli.topology.as_deref(), &config.fabric);
    tracing::debug!(source = %source.describe(), "topology source selected");

    match cli.command.unwrap_or(Commands::Simulate { compact: false }) {
        Commands::Simulate { compact } => {
            let report = runtime.block_on(simulate_once(source.as_mut(), &config))?.report();
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
        }
        Commands::Routes { router } => {
            let report = runtime.block_on(simulate_once(source.as_mut(), &config))?.report();
            let router = router.map(NodeId::from);
            if let Some(router) = router.as_ref().filter(|router| !report.routes.contains_key(*router)) {
                return Err(SimulationError::from(ConfigurationError::NodeNotFound(router.clone())).into());
            }
            print!("{}", output::format_routes(&report, router.as_ref()));
        }
        Commands::Tunnels { segment } => {
            let report = runtime.block_on(simulate_once(source.as_mut(), &config))?.report();
            let segment = segment
                .map(SegmentId::new)
                .transpose()
                .map_err(SimulationError::from)?;
            if let Some(segment) = segment.filter(|segment| report.overlay.segment(*segment).is_none()) {
                return Err(SimulationError::from(OverlayError::UnknownSegment(segment)).into());
            }
            print!("{}", output::format_tunnels(&report, segment));
        }
        Commands::Watch { interval, iterations } => {
            let interval = Duration::from_secs(interval.unwrap_or(config.watch.interval_secs).max(1));
            let store = SnapshotStore::new();
            runtime.block_on(watch(source.as_mut(), &config, &store, interval, iterations))?;
        }
        Commands::Dashboard => {
            let context = DashboardContext {
                runtime: runtime.clone(),
                source,
                overlay: config.overlay.clone(),
                store: Arc::new(SnapshotStore::new()),
            };
            gui::app::main(context).map_err(|e| anyhow::anyhow!("dashboard failed: {e}"))?;
        }
    }
    Ok(())
}

async fn simulate_once(
    source: &mut dyn TopologySource,
    config: &Config,
) -> Result<Simulation, SimulationError> {
    let fabric = source.fetch_topology().await?;
    tracing::info!(source = %source.describe(), routers = fabric.node_count(), "topology loaded");
    simulation::simulate(&fabric, &config.overlay)
}

/// Recompute on every tick and print one compact JSON line per new revision. Failed polls are
/// logged and the previous snapshot stays current.
async fn watch(
    source: &mut dyn TopologySource,
    config: &Config,
    store: &SnapshotStore,
    interval: Duration,
    iterations: Option<u64>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut polls = 0u64;
    tracing::info!(interval = %humantime::format_duration(interval), "watching topology");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping watch");
                break;
            }
        }

        match simulate_once(source, config).await {
            Ok(simulation) => {
                let outcome = store.publish(simulation.report());
                match store.latest() {
                    Some(snapshot) if outcome.changed() => {
                        println!("{}", serde_json::to_string(snapshot.as_ref())?);
                    }
                    _ => {}
                }
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "poll failed, keeping previous snapshot");
            }
        }

        polls += 1;
        if iterations.is_some_and(|limit| polls >= limit) {
            break;
        }
    }
    Ok(())
}
