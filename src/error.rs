//! Error types and utilities.

use thiserror::Error;

/// Errors surfaced by the download/remux pipeline.
#[derive(Error, Debug)]
pub enum RemuxError {
    /// Underlying I/O failure. Sticky at the writer level: once a packet
    /// write fails with this, the sink is considered unusable.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Lifecycle or setup misuse, e.g. mapping a stream after the header
    /// was written or downloading without an opened session.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input or output could not be opened (bad url, unknown container
    /// extension).
    #[error("open error: {0}")]
    Open(String),

    /// A container write failed. Individual packet writes with this error
    /// are non-fatal; the run continues.
    #[error("write error: {0}")]
    Write(String),

    /// A source collaborator failed while producing packets.
    #[error("source error: {0}")]
    Source(String),

    /// The stream is not eligible for remuxing (non audio/video). Always
    /// non-fatal; the stream is skipped.
    #[error("stream rejected: {0}")]
    StreamRejected(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RemuxError>;
