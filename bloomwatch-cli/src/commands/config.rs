//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use bloomwatch::config::{config_file_path, ConfigFile, ENV_OVERRIDES};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file plus environment overrides)
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let overridden: Vec<&str> = ENV_OVERRIDES
        .iter()
        .copied()
        .filter(|name| std::env::var_os(name).is_some())
        .collect();

    println!("; source: {}", config_file_path().display());
    if !overridden.is_empty() {
        println!("; overridden from environment: {}", overridden.join(", "));
    }
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
