//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes: 2 for bad input, 1 for everything else.

use bloomwatch::config::ConfigFileError;
use bloomwatch::service::ServiceError;
use std::fmt;
use std::process;

/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: i32 = 2;
/// Exit code for upstream and I/O failures.
pub const EXIT_FAILURE: i32 = 1;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// A command-line argument could not be used
    InvalidArgument(String),
    /// Failed to create service
    ServiceCreation(ServiceError),
    /// A service operation failed
    Service(ServiceError),
    /// Failed to read an input file
    FileRead { path: String, error: std::io::Error },
    /// Failed to render output
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::InvalidArgument(_) => EXIT_USAGE,
            CliError::Service(e) if e.is_user_error() => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Service(ServiceError::InferenceDisabled) => {
                eprintln!();
                eprintln!("Set inference_endpoint_url under [upstream] in config.ini,");
                eprintln!("or export INFERENCE_ENDPOINT_URL.");
            }
            CliError::Service(ServiceError::AddressNotFound(_)) => {
                eprintln!();
                eprintln!("Try a broader place name, or pass --bbox directly.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'bloomwatch config path' to locate the configuration file.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::ServiceCreation(e) => write!(f, "Failed to create service: {}", e),
            CliError::Service(e) => write!(f, "{}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ServiceCreation(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
