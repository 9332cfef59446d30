//! Error types for bundling Rust Lambda assets

use thiserror::Error;

/// Result alias used across the bundler crates
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that can occur while resolving, building, or hashing an asset
#[derive(Error, Debug)]
pub enum BundleError {
    /// Invalid combination of options
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Remote source repository unreachable, reference not found, or clone failure
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// The delegated build (local or containerized) failed
    #[error("Build error: {message}")]
    BuildError {
        message: String,
        /// Exit status of the build process, if it ran at all
        status: Option<i32>,
        /// Combined stdout and stderr of the build
        output: String,
    },

    /// Host capability probe could not determine toolchain presence
    #[error("Probe error: {0}")]
    ProbeError(String),

    /// Cargo manifest missing, unreadable, or ambiguous
    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BundleError::ConfigurationError(message.into())
    }

    /// Shorthand for a build error without a captured process
    pub fn build(message: impl Into<String>) -> Self {
        BundleError::BuildError {
            message: message.into(),
            status: None,
            output: String::new(),
        }
    }

    /// Stable short name of the error kind, used in logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            BundleError::ConfigurationError(_) => "configuration",
            BundleError::FetchError(_) => "fetch",
            BundleError::BuildError { .. } => "build",
            BundleError::ProbeError(_) => "probe",
            BundleError::ManifestError(_) => "manifest",
            BundleError::Io(_) => "io",
        }
    }

    /// Captured build output, if any
    pub fn build_output(&self) -> Option<&str> {
        match self {
            BundleError::BuildError { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}
