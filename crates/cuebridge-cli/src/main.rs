//! cuebridge CLI - The `cuebridge` command.
//!
//! Loads the configuration, seeds the in-process host from a scene file,
//! then serves the REST/WebSocket API and the optional OSC command listener.
//!
//! # Architecture
//!
//! - **cuebridge-core**: Schema, sync, snapshots, cues, presets, triggers
//! - **cuebridge-http**: REST routes and the WebSocket change channel

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cuebridge_core::{
    BoundedStore, Bridge, ComponentStore, Config, DocumentStore, MemoryStore, OscListener,
    OscOutput,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// cuebridge - live parameter sync and cue control for a node-graph host
#[derive(Parser, Debug)]
#[command(name = "cuebridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parameter sync, snapshots, cues and triggers over HTTP", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP port, overrides [server] port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Scene file seeding the in-process host, overrides [host] scene
    #[arg(long, global = true, value_name = "FILE")]
    scene: Option<PathBuf>,

    /// Directory for persisted cues, presets and pages
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge (default)
    Serve,

    /// Write a commented default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match &args.command {
        None | Some(Commands::Serve) => serve(&args),
        Some(Commands::InitConfig { force }) => init_config(args.config.as_deref(), *force),
        Some(Commands::Version) => {
            println!("cuebridge {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Modular Architecture:");
            println!("  - cuebridge-core: schema, sync, snapshots, cues, presets, triggers");
            println!("  - cuebridge-http: REST API and WebSocket change channel");
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(scene) = &args.scene {
        config.host.scene = scene.display().to_string();
    }
    if let Some(dir) = &args.state_dir {
        config.storage.state_dir = dir.display().to_string();
    }
    Ok(config)
}

fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path().context("No configuration directory available")?,
    };
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::write_default_config_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn serve(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let host = if config.host.scene.is_empty() {
        log::warn!("No scene configured, starting with an empty host graph");
        MemoryStore::new("untitled")
    } else {
        MemoryStore::from_scene_file(&config.host.scene)
            .with_context(|| format!("Failed to load scene {}", config.host.scene))?
    };
    let store: Arc<dyn ComponentStore> = Arc::new(BoundedStore::new(host, config.host.timeout()));

    let state_dir = config.state_dir().context("No state directory available")?;
    let docs = DocumentStore::open(state_dir.clone())
        .with_context(|| format!("Failed to open state directory {}", state_dir.display()))?;

    let osc = OscOutput::bind().await.context("Failed to bind OSC output socket")?;
    let listen_port = config.osc.listen_port;

    let bridge = Arc::new(Bridge::new(config, store, docs, osc).context("Failed to build bridge")?);
    let modules = bridge.start().await.context("Failed to start modules")?;
    let loaded = modules.iter().filter(|m| m.status.is_loaded()).count();
    log::info!("{} of {} modules loaded", loaded, modules.len());

    if listen_port != 0 {
        let listener = OscListener::bind(listen_port)
            .await
            .with_context(|| format!("Failed to bind OSC listener on port {}", listen_port))?;
        let osc_bridge = bridge.clone();
        tokio::spawn(async move {
            if let Err(e) = osc_bridge.serve_osc(listener).await {
                log::error!("OSC listener stopped: {}", e);
            }
        });
    }

    tokio::select! {
        result = cuebridge_http::start_server(bridge) => {
            result.context("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
        }
    }
    Ok(())
}
