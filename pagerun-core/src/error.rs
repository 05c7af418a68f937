use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to run a render exchange at all. Anything the template itself
/// reports (stderr, non-zero exit) is carried in the render result instead.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to spawn `{command}`: {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("no interpreter command configured for templates")]
    EmptyCommand,
    #[error("failed to encode render request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("IO error while talking to the render process: {0}")]
    IoError(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("walk error: {0}")]
    WalkError(#[from] walkdir::Error),
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// A page could not be fetched from the render server.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {href} failed: {message}")]
    Request { href: String, message: String },
    #[error("{href} answered with status {status}")]
    Status { href: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source directory does not exist: {}", .0.display())]
    MissingSourceDir(PathBuf),
    #[error("scan error: {0}")]
    ScanError(#[from] ScanError),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("fetch error: {0}")]
    FetchError(#[from] FetchError),
    #[error("failed to rewrite links in {page}: {message}")]
    Rewrite { page: String, message: String },
}

/// Errors raised on the template side of the protocol.
#[derive(Debug, Error)]
pub enum GuestError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("malformed render request: {0}")]
    Json(#[from] serde_json::Error),
}
