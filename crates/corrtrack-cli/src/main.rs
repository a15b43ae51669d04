mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corrtrack", about = "Sub-pixel particle tracking for movie sequences")]
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
    /// Show movie file metadata
    Info(commands::info::InfoArgs),
    /// Preview correlation maps for the configured anchors on one frame
    TestCorrelation(commands::test_correlation::TestCorrelationArgs),
    /// Track anchors across every frame and write a trajectory file
    Track(commands::track::TrackArgs),
    /// Export movie frames as TIFF images
    ExportTiff(commands::export_tiff::ExportTiffArgs),
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
        Commands::TestCorrelation(args) => commands::test_correlation::run(args),
        Commands::Track(args) => commands::track::run(args),
        Commands::ExportTiff(args) => commands::export_tiff::run(args),
    }
}
