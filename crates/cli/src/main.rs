//! Main entry point for the classlive demo CLI
//!
//! Joins a simulated live class session with the classlive coordinator and
//! prints what happens until the session is left.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}
