//! Error types for layer construction and declaration loading

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for stratum operations
///
/// Resolution itself is infallible; every variant here is raised either while
/// constructing a resolver from declarations or while loading declarations
/// from disk.
#[derive(Debug, Error)]
pub enum StratumError {
    /// A layer declaration is structurally invalid
    #[error(
        "Invalid layer #{layer}{}: '{subject}': {message}{}",
        layer_label(.layer_name),
        origin_label(.declared_in)
    )]
    Validation {
        layer: usize,
        layer_name: Option<String>,
        /// Offending selector string or setting key
        subject: String,
        message: String,
        /// File that declared the layer and the layer's position in it,
        /// when the list was assembled from several files
        declared_in: Option<(PathBuf, usize)>,
    },

    /// A policy table names a merge policy that does not exist
    #[error("Unknown merge policy '{policy}' for key '{key}' (expected replace, append or merge)")]
    UnknownMergePolicy { key: String, policy: String },

    /// Declaration loading errors (missing files, extends cycles, discovery)
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Declaration file could not be parsed
    #[error("Parse error in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn layer_label(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    }
}

fn origin_label(origin: &Option<(PathBuf, usize)>) -> String {
    match origin {
        Some((file, index)) => format!(" (layer #{index} of {})", file.display()),
        None => String::new(),
    }
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    Parse,
    Io,
}

impl StratumError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StratumError::Validation { .. } => ErrorKind::Validation,
            StratumError::UnknownMergePolicy { .. } => ErrorKind::Validation,
            StratumError::ConfigError { .. } => ErrorKind::Config,
            StratumError::ParseError { .. } => ErrorKind::Parse,
            StratumError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Create a layer validation error
    pub fn validation(
        layer: usize,
        layer_name: Option<&str>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            layer,
            layer_name: layer_name.map(str::to_string),
            subject: subject.into(),
            message: message.into(),
            declared_in: None,
        }
    }

    /// Attach the declaring file to a validation error; other errors pass
    /// through unchanged
    pub fn declared_in(self, file: impl Into<PathBuf>, index: usize) -> Self {
        match self {
            StratumError::Validation {
                layer,
                layer_name,
                subject,
                message,
                ..
            } => StratumError::Validation {
                layer,
                layer_name,
                subject,
                message,
                declared_in: Some((file.into(), index)),
            },
            other => other,
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a parse error with file context
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Layer index for validation errors
    pub fn layer_index(&self) -> Option<usize> {
        match self {
            StratumError::Validation { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for StratumError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type for stratum operations
pub type Result<T> = std::result::Result<T, StratumError>;
