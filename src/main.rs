//! Vibelab CLI
//!
//! Command-line entry point for the timeline engine.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vibelab::cli::{commands, Cli, Commands};
use vibelab::EngineConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Vibelab v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Vibelab v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Inspect { snapshot } => commands::inspect(&snapshot)
            .with_context(|| format!("inspecting {}", snapshot.display())),
        Commands::Render {
            snapshot,
            out,
            from,
            seconds,
        } => commands::render(&snapshot, &out, from, seconds, config)
            .map(|_| ())
            .with_context(|| format!("rendering {}", snapshot.display())),
        Commands::InitStore { dir } => commands::init_store(&dir)
            .with_context(|| format!("initialising store in {}", dir.display())),
    }
}
