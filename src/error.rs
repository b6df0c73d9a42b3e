//! Portable error taxonomy surfaced by the engine (spec.md §6–7).
//!
//! These variants are the only vocabulary the core speaks; translating an
//! OS-specific error code into one of these is the out-of-scope boundary
//! layer `std::io` and `mio` already provide for us.

use std::io;

/// Result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Portable error codes consumed by [`crate::client::ClientInterface`]
/// callbacks and returned by entry points.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A programmer error: a null/invalid argument, or a call made in a
    /// state that can't support it. Reported synchronously; no state is
    /// mutated.
    #[error("invalid argument")]
    Fault,

    /// The buffer factory (or an underlying allocation) could not satisfy
    /// a request.
    #[error("out of memory")]
    OutOfMemory,

    /// The operation was severed by an `abort` before it could complete.
    #[error("operation aborted")]
    Aborted,

    /// The socket is closed (or closing) and can no longer accept work.
    #[error("socket closed")]
    Closed,

    /// The connect cascade exhausted every resolved address without
    /// success.
    #[error("unable to connect to any resolved address")]
    Connecting,

    /// Internal: an operation is still in flight. Never surfaced to a
    /// `ClientInterface` — see the open question in spec.md §9 about
    /// whether a synchronously-successful connect should still report
    /// `Waiting`; this crate resolves it by never emitting `Waiting`
    /// upward (see DESIGN.md).
    #[error("operation pending")]
    Waiting,

    /// The requested socket option is not supported on this platform or
    /// in this engine (e.g. querying `SO_ACCEPTCONN`).
    #[error("option not supported")]
    NotSupported,

    /// A transient condition the caller may retry.
    #[error("transient failure, retry")]
    Retry,

    /// An unrecoverable failure; the descriptor has been (or will be)
    /// closed.
    #[error("fatal I/O failure")]
    Fatal,

    /// A generic network error mapped from the OS, carried verbatim.
    #[error("network error: {0}")]
    Net(#[from] io::Error),
}

impl EngineError {
    /// True for the one error the connect cascade must *not* advance past
    /// autonomously (spec.md §7 class 2).
    pub fn is_waiting(&self) -> bool {
        matches!(self, EngineError::Waiting)
    }
}

impl From<EngineError> for io::Error {
    fn from(e: EngineError) -> io::Error {
        match e {
            EngineError::Net(e) => e,
            EngineError::Fault => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            EngineError::OutOfMemory => io::Error::new(io::ErrorKind::OutOfMemory, e.to_string()),
            EngineError::Aborted => io::Error::new(io::ErrorKind::Interrupted, e.to_string()),
            EngineError::Closed => io::Error::new(io::ErrorKind::NotConnected, e.to_string()),
            EngineError::Connecting => {
                io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
            }
            EngineError::Waiting => io::Error::new(io::ErrorKind::WouldBlock, e.to_string()),
            EngineError::NotSupported => {
                io::Error::new(io::ErrorKind::Unsupported, e.to_string())
            }
            EngineError::Retry => io::Error::new(io::ErrorKind::WouldBlock, e.to_string()),
            EngineError::Fatal => io::Error::new(io::ErrorKind::Other, e.to_string()),
        }
    }
}
