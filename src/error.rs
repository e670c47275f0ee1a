use std::io;

use thiserror::Error;

/// Errors surfaced by fabric operations.
///
/// The three stream sentinels (`Eof`, `ClosedPipe`, `Timeout`) are the ones
/// a blocked operation can exit with; callers must be able to tell them
/// apart, so the enum is `PartialEq` and test code can assert on it
/// directly. `AddrInUse` and `ConnectionRefused` only occur on the
/// [`MemoryNetwork`](crate::MemoryNetwork) registry surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    /// The peer closed the connection and every buffered byte has been
    /// drained.
    #[error("end of stream")]
    Eof,
    /// The operation ran against a closed ring, connection, or listener in
    /// a direction that no longer admits it.
    #[error("read/write on closed pipe")]
    ClosedPipe,
    /// A deadline elapsed while the operation was blocked (or was already
    /// in the past when it started). State is left unchanged; the caller
    /// may clear or extend the deadline and retry.
    #[error("i/o deadline exceeded")]
    Timeout,
    /// Another live listener is already bound to this address.
    #[error("address already in use: {addr}")]
    AddrInUse {
        /// The address that was requested.
        addr: String,
    },
    /// No live listener is bound to this address.
    #[error("connection refused: {addr}")]
    ConnectionRefused {
        /// The address that was dialed.
        addr: String,
    },
}

/// A type alias for `Result<T, FabricError>`.
pub type FabricResult<T> = Result<T, FabricError>;

impl From<FabricError> for io::Error {
    fn from(err: FabricError) -> Self {
        let kind = match &err {
            FabricError::Eof => io::ErrorKind::UnexpectedEof,
            FabricError::ClosedPipe => io::ErrorKind::BrokenPipe,
            FabricError::Timeout => io::ErrorKind::TimedOut,
            FabricError::AddrInUse { .. } => io::ErrorKind::AddrInUse,
            FabricError::ConnectionRefused { .. } => io::ErrorKind::ConnectionRefused,
        };
        io::Error::new(kind, err)
    }
}
