//! CLI Module
//!
//! Command-line interface for inspecting and bouncing project snapshots.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vibelab - multi-track vocal studio engine
#[derive(Parser, Debug)]
#[command(name = "vibelab-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the tracks and regions of a snapshot
    #[command(name = "inspect")]
    Inspect {
        /// Snapshot file
        snapshot: PathBuf,
    },

    /// Bounce a snapshot to a WAV file
    #[command(name = "render")]
    Render {
        /// Snapshot file; region audio is resolved relative to it
        snapshot: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        out: PathBuf,

        /// Project time to start from
        #[arg(long, default_value_t = 0.0)]
        from: f64,

        /// Length to render (defaults to the end of the last region)
        #[arg(long)]
        seconds: Option<f64>,
    },

    /// Create the project and track tables in a directory
    #[command(name = "init-store")]
    InitStore {
        /// Directory holding the table files
        dir: PathBuf,
    },
}
