mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slidecube", about = "Slide-scan tile pipeline and compositor")]
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
    /// Read the pyramid inventory of a source container
    Info(commands::info::InfoArgs),
    /// Export a pyramid level as a grid of tiles
    Export(commands::export::ExportArgs),
    /// Composite aligned layers into per-pixel statistics (ray tracing)
    Composite(commands::composite::CompositeArgs),
    /// Join tile grids into pyramidal montages
    Montage(commands::montage::MontageArgs),
    /// Stack arbitrary images into one pyramidal z-stack
    Zstack(commands::zstack::ZstackArgs),
    /// Run the full pipeline
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
        Commands::Export(args) => commands::export::run(args),
        Commands::Composite(args) => commands::composite::run(args),
        Commands::Montage(args) => commands::montage::run(args),
        Commands::Zstack(args) => commands::zstack::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
