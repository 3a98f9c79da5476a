//! Crate-wide error type.
//!
//! Every failure in the replication session collapses into one of the kinds
//! below. Errors are fatal to the session: nothing is retried at this layer,
//! recovery belongs to the outer supervisor that owns the reconnect loop.

/// Errors surfaced by the replication client.
///
/// The type is `Clone` so the driver can both return the originating error
/// and retain a copy for the [`err()`](crate::replica::Replica::err) query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed wire data: unexpected RESP byte, bad CRLF, unknown or
    /// out-of-state RDB opcode, invalid length encoding, LZF length
    /// mismatch, missing ziplist terminator, and similar.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket or cache-file I/O failure, including short reads and writes.
    #[error("io error: {0}")]
    Io(String),

    /// The master replied with a RESP error frame.
    #[error("server error: {0}")]
    Server(String),

    /// A producer attempted to push onto a full backlog. Dropping commands
    /// would silently lose data, so the session dies instead.
    #[error("backlog queue size exceeded")]
    BacklogOverflow,

    /// A consumer callback returned an error.
    #[error("consumer error: {0}")]
    Consumer(String),

    /// The session was cancelled before the operation completed.
    #[error("replication cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a [`Error::Protocol`] with a formatted message.
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
