//! CLI for topicmon
//!
//! Subcommands:
//! - `watch`: follow the discovery snapshot and log every topic change
//! - `publish`: additionally run a publish session on one topic over the
//!   loopback transport

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use topicmon::config::{Settings, load_config, load_config_from};
use topicmon::discovery::{FileDiscovery, follow};
use topicmon::message::StaticTypeResolver;
use topicmon::notify::LogSink;
use topicmon::registry::TopicRegistry;
use topicmon::session::{PublishRate, PublishRequest, SessionContext, SessionSettings};
use topicmon::transport::LoopbackTransport;
use topicmon::utils::logging;

#[derive(Parser)]
#[command(name = "topicmon")]
struct Cli {
    /// Configuration file (defaults to config/default.* plus environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file, overrides discovery.snapshot_path
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the topic snapshot and log changes
    Watch,
    /// Publish synthetic messages on a topic while watching
    Publish {
        /// Topic to publish on
        topic: String,
        /// Messages per second, or "once"
        #[arg(long, default_value = "once")]
        rate: PublishRate,
        /// Field arguments as JSON (object by field name or positional array)
        #[arg(long, default_value = "null")]
        args: String,
        /// Subscribers to wait for; defaults to the topic's subscriber count
        #[arg(long)]
        expect: Option<usize>,
        /// Simulated subscriber connections on the loopback transport
        #[arg(long, default_value_t = 0)]
        connections: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    if let Err(e) = run(cli, settings).await {
        error!("topicmon failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot_path = cli
        .snapshot
        .unwrap_or_else(|| PathBuf::from(&settings.discovery.snapshot_path));
    let discovery = FileDiscovery::new(snapshot_path);

    let transport = LoopbackTransport::new(settings.transport.max_message_bytes)
        .with_history_limit(settings.transport.history_limit);
    let resolver = StaticTypeResolver::new(settings.types.clone());
    let ctx = SessionContext {
        transport: Arc::new(transport.clone()),
        sink: Arc::new(LogSink),
        settings: SessionSettings::from(&settings.publish),
    };
    let mut registry = TopicRegistry::new(Arc::new(resolver), ctx);

    // The first snapshot has to be in before a topic can be looked up.
    registry.reconcile(&discovery.poll().await?);
    info!(
        "Loaded {} topics from {}",
        registry.len(),
        discovery.path().display()
    );

    if let Command::Publish {
        topic,
        rate,
        args,
        expect,
        connections,
    } = cli.command
    {
        transport.set_connections(&topic, connections);
        let request = PublishRequest {
            rate,
            args: serde_json::from_str(&args)?,
            expected_subscribers: expect,
        };
        registry.start_publish(&topic, request)?;
    }

    let interval = Duration::from_millis(settings.discovery.poll_interval_ms.max(1));
    follow(&discovery, &mut registry, interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received. Stopping publish sessions.");
    })
    .await;

    for session in registry.stop_all() {
        session.join().await;
    }
    Ok(())
}
