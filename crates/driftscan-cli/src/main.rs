mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "driftscan", about = "Offset-tracking surface-velocity pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show product container metadata
    Info(commands::info::InfoArgs),
    /// Run offset tracking on a stored coregistered stack
    Track(commands::track::TrackArgs),
    /// Render a quicklook image from a product
    Export(commands::export::ExportArgs),
    /// Run the full five-stage pipeline
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Track(args) => commands::track::run(args),
        Commands::Export(args) => commands::export::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
