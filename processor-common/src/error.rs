// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error};

/// Broad classification of a [ProcessorError].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A file or directory a prior step should have produced is absent.
    NotFound,
    /// An external program exited nonzero, could not be spawned, or timed out.
    ExternalToolFailure,
    /// A precondition the procedure relies on does not hold.
    InvariantViolation,
    /// Malformed XML, plist, JSON or HTML.
    ParseFailure,
    /// Filesystem or network I/O failed.
    Io,
    /// Input variables are missing or unusable.
    Input,
}

/// Unified error type for recipe processors.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{step}: {what} not found at {}", path.display())]
    NotFound {
        step: &'static str,
        what: String,
        path: PathBuf,
    },

    #[error("{step}: {operation} failed (exit code {code}): {stderr}")]
    ExternalToolFailure {
        step: &'static str,
        operation: String,
        code: i32,
        stderr: String,
    },

    #[error("{step}: {operation} did not finish within {seconds} seconds")]
    ToolTimeout {
        step: &'static str,
        operation: String,
        seconds: u64,
    },

    #[error("{step}: {message}")]
    InvariantViolation { step: &'static str, message: String },

    #[error("{step}: unable to parse {what}: {message}")]
    ParseFailure {
        step: &'static str,
        what: String,
        message: String,
    },

    #[error("{step}: I/O error on {}: {source}", path.display())]
    Io {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },

    #[error("missing required input variable: {0}")]
    MissingInput(String),

    #[error("invalid value for input variable {name}: {message}")]
    InvalidInput { name: String, message: String },

    #[error("unknown processor: {0}")]
    UnknownProcessor(String),
}

impl ProcessorError {
    /// Obtain the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ExternalToolFailure { .. } | Self::ToolTimeout { .. } => {
                ErrorKind::ExternalToolFailure
            }
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
            Self::Io { .. } | Self::Http { .. } => ErrorKind::Io,
            Self::MissingInput(_) | Self::InvalidInput { .. } | Self::UnknownProcessor(_) => {
                ErrorKind::Input
            }
        }
    }

    pub fn not_found(step: &'static str, what: impl ToString, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            step,
            what: what.to_string(),
            path: path.into(),
        }
    }

    pub fn invariant(step: &'static str, message: impl ToString) -> Self {
        Self::InvariantViolation {
            step,
            message: message.to_string(),
        }
    }

    pub fn parse(step: &'static str, what: impl ToString, message: impl ToString) -> Self {
        Self::ParseFailure {
            step,
            what: what.to_string(),
            message: message.to_string(),
        }
    }

    pub fn io(step: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            step,
            path: path.into(),
            source,
        }
    }

    pub fn invalid_input(name: impl ToString, message: impl ToString) -> Self {
        Self::InvalidInput {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Attach a step name and path to I/O results.
pub trait IoResultExt<T> {
    fn step_context(self, step: &'static str, path: impl Into<PathBuf>) -> Result<T, ProcessorError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn step_context(self, step: &'static str, path: impl Into<PathBuf>) -> Result<T, ProcessorError> {
        self.map_err(|e| ProcessorError::io(step, path, e))
    }
}
