//! Centralized CLI error handling with exit codes.

use std::fmt;
use std::process;

use flapdeck::service::ServiceError;

/// Exit code for configuration problems (bad flags, unreadable or invalid
/// display document).
const EXIT_CONFIG: i32 = 1;
/// Exit code for unrecoverable transport or provider failures.
const EXIT_TRANSPORT: i32 = 2;

#[derive(Debug)]
pub enum CliError {
    Config(String),
    Service(ServiceError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Service(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Service(e) => Some(e),
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Service(ServiceError::Store(_)) => EXIT_CONFIG,
            Self::Service(_) => EXIT_TRANSPORT,
        }
    }

    /// Print the error and terminate with its exit code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");
        process::exit(self.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_one() {
        let err = CliError::Config("missing port".to_string());
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn test_transport_errors_exit_two() {
        let err = CliError::Service(ServiceError::Serial(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such port",
        )));
        assert_eq!(err.exit_code(), EXIT_TRANSPORT);
    }
}
