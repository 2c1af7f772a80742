use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::decompiler::DecompileError;

/// Failures the scan pipeline narrates. None of them abort a run on their own;
/// the offending root, file or module is skipped.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Error reading {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to hash {}: {source}", .path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Decompile(#[from] DecompileError),

    #[error("Decompile cache error at {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {}: {message}", .root.display())]
    Collect { root: PathBuf, message: String },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
