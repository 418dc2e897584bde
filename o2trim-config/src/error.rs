use std::io;
use std::path::PathBuf;

use thiserror_no_std::Error;

use crate::validation::ValidationReport;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors loading, editing or saving the settings document
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the settings file failed
    #[error("Settings file {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not a complete settings document
    #[error("Settings document does not parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but cannot drive the controller
    #[error("Invalid settings: {0}")]
    Invalid(ValidationReport),

    /// Channel index outside `0..4`
    #[error("No analog channel {0}")]
    UnknownChannel(usize),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Validation report, when the document was rejected by validation
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }
}
