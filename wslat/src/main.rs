//! wslat command-line tool.
//!
//! Run a server:  `wslat -m server -a rtt -p 10443`
//! Run a client:  `wslat -m client -a rtt -s ws://localhost:10443/ws -r 100 -d 60`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::info;
use wslat::SummaryTable;
use wslat_client::RunBuilder;
use wslat_core::{Model, RunConfig};
use wslat_server::{EchoPayload, ServerBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AppType {
    /// Server pushes timestamped events
    Push,
    /// Client sends requests, server echoes them
    Rtt,
}

impl From<AppType> for Model {
    fn from(app: AppType) -> Self {
        match app {
            AppType::Push => Model::Push,
            AppType::Rtt => Model::RequestResponse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Server,
    Client,
}

/// WebSocket latency measurement
#[derive(Parser, Debug)]
#[command(name = "wslat", version, about)]
struct Args {
    /// Application type
    #[arg(short = 'a', long, value_enum, default_value_t = AppType::Push)]
    app_type: AppType,

    /// Run as server or client
    #[arg(short = 'm', long, value_enum)]
    mode: Mode,

    /// Port for the server to listen on
    #[arg(short = 'p', long, default_value = "10443")]
    port: u16,

    /// Events or requests per second
    #[arg(short = 'r', long, default_value = "10")]
    rate: u32,

    /// WebSocket server URL
    #[arg(short = 's', long, env = "WSLAT_SERVER", default_value = wslat_core::config::DEFAULT_URL)]
    server: String,

    /// Test duration in seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,

    /// Message payload size in bytes
    #[arg(long, default_value = "100")]
    payload_size: usize,

    /// Skip the first N samples
    #[arg(long, default_value = "100")]
    prewarm_count: u64,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Run until interrupted instead of for a fixed duration
    #[arg(long)]
    continuous: bool,

    /// Stop once this many samples have been retained
    #[arg(long)]
    early_stop: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Log progress every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    progress_interval: u64,

    /// Echo a generated payload when a request arrives with an empty one
    #[arg(long)]
    echo_fill_empty: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.mode {
        Mode::Server => run_server(&args).await,
        Mode::Client => run_client(&args).await,
    }
}

async fn run_server(args: &Args) -> Result<()> {
    let echo_payload = if args.echo_fill_empty {
        EchoPayload::FillEmpty(args.payload_size)
    } else {
        EchoPayload::Verbatim
    };

    let (server, handle) = ServerBuilder::new()
        .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port)))
        .model(args.app_type.into())
        .rate(args.rate)
        .payload_size(args.payload_size)
        .echo_payload(echo_payload)
        .build();

    let shutdown = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Interrupted, shutting down");
        shutdown.shutdown();
    });

    server.run().await.context("server failed")?;

    let stats = handle.stats();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        info!(
            "Served {} connections: {} frames received, {} sent, {} malformed",
            stats.accepted, stats.received, stats.sent, stats.parse_errors
        );
    }
    Ok(())
}

async fn run_client(args: &Args) -> Result<()> {
    let progress = (args.progress_interval > 0).then(|| Duration::from_secs(args.progress_interval));
    let config = RunConfig::new(args.server.clone())
        .model(args.app_type.into())
        .rate(args.rate)
        .payload_size(args.payload_size)
        .duration(Duration::from_secs(args.duration))
        .warmup(args.prewarm_count)
        .continuous(args.continuous)
        .insecure(args.insecure)
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .early_stop_samples(args.early_stop)
        .progress_interval(progress);

    if args.continuous {
        info!("Connecting to {} for continuous monitoring", config.url);
    } else {
        info!("Connecting to {} for {} seconds", config.url, args.duration);
    }

    let (run, handle) = RunBuilder::new(config).build();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Interrupted, finishing run");
        handle.stop();
    });

    let report = run
        .run()
        .await
        .with_context(|| format!("run against {} failed", args.server))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}\n", SummaryTable(&report));
    }
    Ok(())
}
