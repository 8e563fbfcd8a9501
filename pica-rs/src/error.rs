//! Host-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpError;
use crate::script::ScriptError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: ScriptError,
    },
    /// A file imports itself, directly or through other imports.
    #[error("{path}: import cycle through {via}")]
    ImportCycle { path: PathBuf, via: PathBuf },
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("{0}")]
    Usage(String),
    /// A failure while running one API item.
    #[error("item #{index} [{name}]: {source}")]
    Item {
        index: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },
    /// A request-phase binding the runner needs is missing or malformed.
    #[error("{0}")]
    Binding(String),
    #[error(transparent)]
    Runtime(#[from] crate::script::RuntimeError),
    /// A native function could not be installed.
    #[error(transparent)]
    Builtin(#[from] crate::script::ErrorKind),
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("{0}")]
    Json(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
