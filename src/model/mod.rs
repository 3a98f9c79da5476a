//! Data entities produced by the replication session: decoded keys and live
//! commands.

pub mod command;
pub mod key;

pub use command::{Command, CommandKind};
pub use key::{Key, Value};
