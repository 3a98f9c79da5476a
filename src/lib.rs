//! Logical replication client for Redis-compatible servers.
//!
//! The crate attaches to a master as if it were a replica: it sends the
//! `SYNC` directive, streams the initial RDB snapshot to a local cache file,
//! decodes the snapshot into typed keys, and keeps consuming the live
//! command stream on the same socket. Live commands received while the
//! snapshot is still being decoded are buffered in a bounded backlog and
//! drained afterwards, so a [`Consumer`] always observes snapshot keys
//! before any live command.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use redsync::{Command, Consumer, Key, Replica, ReplicaConfig, Result};
//!
//! struct Printer;
//!
//! impl Consumer for Printer {
//!     fn key(&self, key: Key) -> Result<()> {
//!         println!("db {} key {:?}", key.db, key.name);
//!         Ok(())
//!     }
//!
//!     fn command(&self, command: Command) -> Result<()> {
//!         println!("command {:?}", command.kind());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:6379").await
//!         .map_err(redsync::Error::from)?;
//!     let replica = Replica::new(ReplicaConfig::default());
//!     replica.run(stream, Arc::new(Printer)).await
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod model;
pub mod protocol;
pub mod rdb;
pub mod replica;

pub use config::ReplicaConfig;
pub use consumer::Consumer;
pub use error::{Error, Result};
pub use model::command::{Command, CommandKind};
pub use model::key::{Key, Value};
pub use replica::backlog::Backlog;
pub use replica::status::ReplicaStatus;
pub use replica::Replica;
