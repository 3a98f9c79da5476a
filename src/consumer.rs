//! The consumer contract: the single extension point through which the
//! replication session hands data to the host application.

use crate::error::{Error, Result};
use crate::model::command::Command;
use crate::model::key::Key;
use crate::replica::status::ReplicaStatus;

/// Receiver of everything a replication session produces.
///
/// The driver calls into a consumer from two concurrent tasks — the
/// snapshot decoder and the backlog drain — so implementations must be
/// reentrant (`Send + Sync`). Any `Err` returned from [`key`](Self::key) or
/// [`command`](Self::command) cancels the session; each key and command is
/// delivered at most once.
pub trait Consumer: Send + Sync + 'static {
    /// A decoded key, either from the snapshot or synthesized from a live
    /// command.
    fn key(&self, key: Key) -> Result<()>;

    /// A control or mutation command from the live stream.
    fn command(&self, command: Command) -> Result<()>;

    /// Admission filter: return `false` to keep a live command out of the
    /// backlog. Control commands (ping, select) bypass this filter so the
    /// drain phase never loses database-selection context.
    fn check_command(&self, command: &Command) -> bool {
        let _ = command;
        true
    }

    /// Lifecycle notification. Informational; errors cannot be raised here.
    fn replica_status(&self, status: ReplicaStatus) {
        let _ = status;
    }

    /// The session is shutting down. `err` is `None` on a clean cancel.
    fn cancel(&self, err: Option<&Error>) {
        let _ = err;
    }
}
