//! nfb-daemon: real-time mu-rhythm neurofeedback engine

use anyhow::{Context, Result};
use clap::Parser;
use nfb_core::{StreamDescriptor, StreamDiscovery, StreamQuery};
use nfb_daemon::cli::{Cli, Command, ListArgs, RunArgs};
use nfb_daemon::shutdown::{shutdown_channel, termination_signal};
use nfb_daemon::{FeedbackEngine, StatePublisher, StreamConnector};
use nfb_processing::FeedbackConfig;
use nfb_simulation::{
    start_simulated_stream, EegConfig, EegSimulator, MuPattern, VirtualStreamRegistry,
    SIMULATED_SOURCE_ID, SIMULATED_STREAM_NAME,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::ListStreams(args) => list_streams(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => FeedbackConfig::from_session_file(path)
            .with_context(|| format!("loading session file {}", path.display()))?,
        None => FeedbackConfig::default(),
    };

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    let shutdown = shutdown_channel(termination_signal());

    let backend: Arc<dyn StreamDiscovery> = if args.simulate {
        let registry = VirtualStreamRegistry::new();
        let sim_config = EegConfig {
            sampling_rate: config.sample_rate.unwrap_or(250.0),
            pattern: MuPattern::demo(),
            ..EegConfig::default()
        };
        start_simulated_stream(&registry, sim_config, shutdown.clone())
            .context("starting simulated stream")?;
        Arc::new(registry)
    } else {
        network_backend()?
    };

    let mut engine = FeedbackEngine::new(
        config,
        StreamConnector::new(backend),
        StatePublisher::new(&args.output),
    );
    info!(
        output = %engine.publisher().destination().display(),
        simulate = args.simulate,
        "starting feedback engine"
    );
    engine.run(shutdown).await;
    Ok(())
}

async fn list_streams(args: ListArgs) -> Result<()> {
    let backend: Arc<dyn StreamDiscovery> = if args.simulate {
        let registry = VirtualStreamRegistry::new();
        let simulator = EegSimulator::new(EegConfig::default()).context("building simulator")?;
        registry.announce(simulator.descriptor(SIMULATED_STREAM_NAME, SIMULATED_SOURCE_ID));
        Arc::new(registry)
    } else {
        network_backend()?
    };

    let timeout = Duration::try_from_secs_f64(args.timeout.max(0.0)).unwrap_or(Duration::ZERO);
    let streams: Vec<StreamDescriptor> = StreamConnector::new(backend)
        .list(&StreamQuery::all(), timeout)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "stream listing failed");
            Vec::new()
        });

    println!("{}", serde_json::to_string_pretty(&streams)?);
    Ok(())
}

#[cfg(feature = "lsl-support")]
fn network_backend() -> Result<Arc<dyn StreamDiscovery>> {
    Ok(Arc::new(nfb_daemon::lsl_backend::LslDiscovery::new()))
}

#[cfg(not(feature = "lsl-support"))]
fn network_backend() -> Result<Arc<dyn StreamDiscovery>> {
    anyhow::bail!("built without LSL support; rebuild with `--features lsl-support` or pass --simulate")
}
