//! Error types for the VarroaPop wrapper.
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for wrapper operations.
pub type VarroaPopResult<T> = Result<T, VarroaPopError>;

/// Errors that can occur while preparing, running or reading a VarroaPop simulation.
#[derive(Error, Debug)]
pub enum VarroaPopError {
    /// A caller supplied a value of the wrong shape (e.g. a nested table as a parameter).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument
        message: String,
    },

    /// A required path, flag or lifecycle step was missing before invoking the engine.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// A referenced file does not exist.
    #[error("{what} not found: {}", path.display())]
    NotFound {
        /// The kind of file which was looked for
        what: &'static str,
        /// The missing path
        path: PathBuf,
    },

    /// A malformed `key=value` line or result line.
    #[error("Error reading {} (line {line}): {message}", path.display())]
    Format {
        /// The file being read
        path: PathBuf,
        /// One-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// The engine's initialisation call reported failure.
    #[error("Engine initialisation failed{}", diagnostics_suffix(.diagnostics))]
    EngineInit {
        /// Error and info lines retrieved from the engine
        diagnostics: Vec<String>,
    },

    /// The engine refused some pushed state.
    #[error("Engine rejected {what}{}", diagnostics_suffix(.diagnostics))]
    EngineRejected {
        /// Which push was rejected
        what: &'static str,
        /// Error and info lines retrieved from the engine
        diagnostics: Vec<String>,
    },

    /// The simulation itself failed.
    #[error("Engine run failed: {message}{}", diagnostics_suffix(.diagnostics))]
    EngineRun {
        /// Summary of the failure
        message: String,
        /// Error and info lines retrieved from the engine (or stderr for the process variant)
        diagnostics: Vec<String>,
    },

    /// A data line's token count did not match the result schema.
    #[error("Result line {line} has {found} fields but the schema has {expected} columns")]
    SchemaMismatch {
        /// One-based line number in the raw result
        line: usize,
        /// Number of columns in the schema
        expected: usize,
        /// Number of tokens found on the line
        found: usize,
    },

    /// An underlying read or write failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file being accessed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The engine process did not finish within the configured timeout.
    #[error("Engine did not finish within {seconds} seconds")]
    Timeout {
        /// The timeout which was exceeded
        seconds: u64,
    },
}

impl VarroaPopError {
    /// Create an [`VarroaPopError::InvalidArgument`] error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a [`VarroaPopError::Configuration`] error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a [`VarroaPopError::Io`] error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The engine diagnostic lines attached to this error, if any
    pub fn diagnostics(&self) -> &[String] {
        match self {
            Self::EngineInit { diagnostics }
            | Self::EngineRejected { diagnostics, .. }
            | Self::EngineRun { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Format engine diagnostics for inclusion in an error message
fn diagnostics_suffix(diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(":\n  {}", diagnostics.iter().join("\n  "))
    }
}
