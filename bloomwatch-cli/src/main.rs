//! Bloomwatch CLI - Command-line interface
//!
//! This binary provides a command-line interface to the bloomwatch library.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::classify::ClassifyArgs;
use commands::config::ConfigCommands;
use commands::layers::LayersArgs;
use commands::scenes::ScenesArgs;
use commands::view::ViewArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "bloomwatch")]
#[command(version = bloomwatch::VERSION)]
#[command(about = "Combine map layers, satellite scenes and image classification for an area")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the combined map view for an area
    View(ViewArgs),

    /// List or describe tile layers
    Layers(LayersArgs),

    /// Search satellite scenes
    Scenes(ScenesArgs),

    /// Classify an image
    Classify(ClassifyArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config(command) = cli.command {
        return commands::config::run(command);
    }

    let runner = CliRunner::with_debug(cli.debug)?;
    match cli.command {
        Commands::View(args) => commands::view::run(&runner, args).await,
        Commands::Layers(args) => commands::layers::run(&runner, args).await,
        Commands::Scenes(args) => commands::scenes::run(&runner, args).await,
        Commands::Classify(args) => commands::classify::run(&runner, args).await,
        Commands::Config(_) => Ok(()),
    }
}
