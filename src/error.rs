//! Error type shared by the training pipeline.
//!
//! Every failure is fatal to the run that raised it: nothing in the crate
//! retries. Numeric degeneracy (NaN or infinite loss) is not an error and
//! flows through into the logs unchanged.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, PinnError>;

#[derive(Error, Debug)]
pub enum PinnError {
    /// Array shapes disagree with what a kernel or routine was built for.
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The surrogate or its inputs break the call contract.
    #[error("surrogate contract violated: {0}")]
    Contract(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A training log could not be parsed while aggregating window errors.
    #[error("malformed log file {path}: {message}")]
    MalformedLog { path: PathBuf, message: String },

    #[error("npy error at {path}: {message}")]
    Npy { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("reference data error: {0}")]
    Reference(String),

    #[error("visualization failed: {0}")]
    Plot(String),
}

impl PinnError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn npy(path: impl AsRef<Path>, err: impl std::fmt::Display) -> Self {
        Self::Npy {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn shape(context: &'static str, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
