use {
    clap::Parser,
    compute_attribution::{
        driver::spawn_attribution, pipeline::AttributionPipeline, rpc::JsonRpcBlockSource,
    },
    compute_heatmap::{
        config::Config,
        stdio::{run_commands, spawn_stdin_lines, write_outcomes},
    },
    std::{path::PathBuf, time::Duration},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

pub fn init_tracing() {
    let io_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let level_layer = EnvFilter::builder().from_env_lossy();
    tracing_subscriber::registry()
        .with(io_layer)
        .with(level_layer)
        .try_init()
        .expect("tracing init");
}

#[derive(Debug, clap::Parser)]
#[clap(
    author,
    version,
    about = "Streams per-block compute unit attribution as JSON lines"
)]
struct Args {
    #[clap(long)]
    config: PathBuf,
    /// First slot to fetch. Defaults to the upstream current slot minus the configured lag.
    #[clap(long)]
    start_slot: Option<u64>,
    /// Exit after publishing this many payloads.
    #[clap(long)]
    max_payloads: Option<usize>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    let config = Config::load(&args.config).expect("load config");

    let source = JsonRpcBlockSource::new(
        config.rpc_url.clone(),
        config.commitment.into(),
        Duration::from_millis(config.request_timeout_ms),
    )
    .expect("rpc client");
    let pipeline = AttributionPipeline::new(config.pipeline.clone(), config.address_labels());

    tracing::info!(
        rpc_url = %config.rpc_url,
        max_in_flight = config.scheduler.max_in_flight,
        "starting compute attribution"
    );
    let (handle, payloads) =
        spawn_attribution(source, pipeline, config.scheduler.clone(), args.start_slot);

    let commands = tokio::spawn(run_commands(spawn_stdin_lines(), handle.clone()));

    tokio::select! {
        result = write_outcomes(payloads, tokio::io::stdout(), args.max_payloads) => {
            match result {
                Ok(written) => tracing::info!("published {written} payloads"),
                Err(e) => tracing::error!("stdout closed: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }

    let _ = handle.shutdown().await;
    commands.abort();
    tracing::info!(stats = ?handle.stats(), "final stats");
}
