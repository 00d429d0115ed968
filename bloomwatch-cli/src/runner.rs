//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and service creation
//! so command handlers only deal with their own arguments.

use crate::error::CliError;
use bloomwatch::config::ConfigFile;
use bloomwatch::logging::{init_from_settings, LoggingGuard};
use bloomwatch::service::BloomwatchService;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration (file plus environment overrides)
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless of config
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let mut config = ConfigFile::load()?;
        config.logging.debug |= debug_mode;

        let logging_guard = init_from_settings(&config.logging)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Bloomwatch v{}", bloomwatch::VERSION);
        info!("Bloomwatch CLI: {} command", command);
    }

    /// Create a service from the loaded configuration.
    pub fn create_service(&self) -> Result<BloomwatchService, CliError> {
        BloomwatchService::new(self.config.clone())
            .map_err(CliError::ServiceCreation)
            .inspect(|_| info!("Service created successfully"))
    }
}
