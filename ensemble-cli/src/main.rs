//! Ensemble keeps concurrently running instances aware of each other.
//!
//! # Usage
//!
//! ```text
//! ensemble join [--session <name>] [--shape x,y,w,h | --shape-file <path>] [--meta <json>] [--interval-ms <n>]
//! ensemble list [--session <name>] [--json]
//! ensemble reset [--session <name>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{join::JoinArgs, list::ListArgs, reset::ResetArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ensemble",
    version,
    about = "Coordinate concurrently running instances through a shared session store",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join a session as a new instance and stay until interrupted.
    Join(JoinArgs),

    /// Show the instances currently registered in a session.
    List(ListArgs),

    /// Delete a session's stored registry and counter.
    Reset(ResetArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Join(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Reset(args) => args.run(),
    }
}
