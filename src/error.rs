//! Error types for waldur-os.
//!
//! Module and API errors live next to the code that raises them
//! ([`ModuleError`], [`ClientError`](crate::modules::cloud::waldur::ClientError));
//! this is the error for everything around a module run.

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for waldur-os operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for waldur-os.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {message}")]
    Config {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Module arguments file could not be read or parsed.
    #[error("Failed to read module arguments from '{path}': {message}")]
    ArgsFile {
        /// Path to the arguments file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The module itself failed.
    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl Error {
    /// Create an arguments-file error.
    pub fn args_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ArgsFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
