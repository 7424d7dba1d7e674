use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole migration cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no destination directory configured")]
    NoDestination,
    #[error("failed to create destination directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from relocating a single file. Logged, never fatal to the cycle.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("a file with that name already exists in the destination")]
    DestinationExists,
    #[error("source and destination are on different filesystems")]
    CrossesDevices,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    pub(crate) fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
