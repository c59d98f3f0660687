//! Crate-level error type for failures that are not policy violations.

use std::path::PathBuf;
use thiserror::Error;

use crate::knv::MultiError;

/// Errors raised by the compiler's outer surfaces.
///
/// Policy violations found while compiling a tree are collected into a
/// [`MultiError`] and surface here as [`NomosError::Rejected`].
#[derive(Error, Debug)]
pub enum NomosError {
    #[error("Policy directory not found: {0}")]
    PolicyDirNotFound(PathBuf),

    #[error("Failed to read policy directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse compiler config '{path}': {message}")]
    ParseConfig { path: PathBuf, message: String },

    #[error("Failed to parse discovery document '{path}': {message}")]
    ParseDiscovery { path: PathBuf, message: String },

    #[error("Failed to register error code: {0}")]
    Registry(#[from] crate::knv::RegistryError),

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("{0}")]
    Rejected(MultiError),
}

impl From<MultiError> for NomosError {
    fn from(errors: MultiError) -> Self {
        NomosError::Rejected(errors)
    }
}

impl From<notify::Error> for NomosError {
    fn from(e: notify::Error) -> Self {
        NomosError::Watch(e.to_string())
    }
}

/// Result alias for crate operations.
pub type Result<T> = std::result::Result<T, NomosError>;
