//! The replication driver and its supporting pieces: the socket-facing
//! connection, the bounded backlog, lifecycle statuses, and the session
//! state machine itself.

pub mod backlog;
pub mod connection;
pub mod driver;
pub mod status;

pub use backlog::Backlog;
pub use connection::{Connection, Message};
pub use driver::Replica;
pub use status::ReplicaStatus;
