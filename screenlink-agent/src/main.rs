//! screenlink agent entry point.
//!
//! ```text
//! screenlink-agent                  Serve the controller over stdin/stdout
//! screenlink-agent --config <path>  Load a custom config TOML
//! screenlink-agent --assets <dir>   Override the template directory
//! screenlink-agent --gen-config     Write default config to stdout
//! ```
//!
//! stdout carries the protocol, so every diagnostic goes to stderr.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use screenlink_agent::config::{AgentConfig, ConfigSource};
use screenlink_agent::service::AgentService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "screenlink-agent", about = "Screen streaming and remote input agent")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "screenlink.toml")]
    config: PathBuf,

    /// Template image directory (overrides `automation.assets_dir`).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AgentConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let (mut config, source) = AgentConfig::load(&cli.config);
    if let Some(dir) = cli.assets {
        config.automation.assets_dir = dir;
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from));
    config.automation.assets_dir = config.assets_dir(exe_dir.as_deref());

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("screenlink-agent v{}", env!("CARGO_PKG_VERSION"));
    match source {
        ConfigSource::File => info!("config: {}", cli.config.display()),
        ConfigSource::Missing => info!("no config at {}, using defaults", cli.config.display()),
        ConfigSource::Invalid(e) => warn!("invalid config {}: {e}; using defaults", cli.config.display()),
    }
    info!("target FPS: {}", config.stream.fps);
    info!("monitor: {}", config.stream.initial_monitor);

    let service = AgentService::new(config);
    tokio::select! {
        result = service.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down"),
    }

    Ok(())
}
