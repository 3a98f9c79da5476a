//! Shared test utilities for the replication integration tests.
//!
//! Import via `mod common;` in integration test files.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use redsync::rdb::{encode, opcode, value_type};
use redsync::{Command, CommandKind, Consumer, Key, Replica, ReplicaConfig, ReplicaStatus, Result};

/// One delivery observed by the consumer, in global arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Key(Bytes),
    Command(CommandKind),
}

/// A consumer that records every delivery and can misbehave on demand.
#[derive(Default)]
pub struct Recording {
    pub deliveries: Mutex<Vec<Delivery>>,
    pub keys: Mutex<Vec<Key>>,
    pub commands: Mutex<Vec<Command>>,
    pub statuses: Mutex<Vec<ReplicaStatus>>,
    /// Reject undefined commands at the admission filter.
    pub reject_undefined: bool,
    /// Fail after this many command deliveries, if set.
    pub fail_on_command: Option<usize>,
}

impl Recording {
    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn statuses(&self) -> Vec<ReplicaStatus> {
        self.statuses.lock().clone()
    }
}

impl Consumer for Recording {
    fn key(&self, key: Key) -> Result<()> {
        self.deliveries.lock().push(Delivery::Key(key.name.clone()));
        self.keys.lock().push(key);
        Ok(())
    }

    fn command(&self, command: Command) -> Result<()> {
        if let Some(limit) = self.fail_on_command {
            if self.commands.lock().len() >= limit {
                return Err(redsync::Error::Consumer("rejected by test consumer".into()));
            }
        }
        self.deliveries
            .lock()
            .push(Delivery::Command(command.kind()));
        self.commands.lock().push(command);
        Ok(())
    }

    fn check_command(&self, command: &Command) -> bool {
        !(self.reject_undefined && command.kind() == CommandKind::Undefined)
    }

    fn replica_status(&self, status: ReplicaStatus) {
        self.statuses.lock().push(status);
    }
}

/// Build a snapshot containing string keys `(name, value)` in database 0.
pub fn rdb_with_string_keys(keys: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut body = encode::magic(7);
    body.push(opcode::SELECTDB);
    body.extend_from_slice(&encode::encode_length(0));
    for (name, value) in keys {
        body.push(value_type::STRING);
        body.extend_from_slice(&encode::encode_string(name));
        body.extend_from_slice(&encode::encode_string(value));
    }
    body.push(opcode::EOF);
    body.extend_from_slice(&0u64.to_le_bytes());
    body
}

/// Frame the snapshot the way the master announces it: a top-level
/// bulk-string header followed by the raw payload.
pub fn announce_snapshot(rdb: &[u8]) -> Vec<u8> {
    let mut script = format!("${}\r\n", rdb.len()).into_bytes();
    script.extend_from_slice(rdb);
    script
}

/// RESP-encode an argv as an array of bulk strings.
pub fn command_frame(args: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// A test config writing the cache under `dir`.
pub fn test_config(dir: &tempfile::TempDir) -> ReplicaConfig {
    ReplicaConfig {
        cache_rdb_file: dir.path().join("replica.rdb"),
        ..ReplicaConfig::default()
    }
}

/// Drive a full session against a scripted master.
///
/// The master accepts the sync directive, replays `script`, waits until the
/// consumer has seen `expect_commands` commands (so shutdown never races
/// delivery assertions), and closes the socket. Returns the session result.
pub async fn run_scripted(
    replica: &Replica,
    consumer: Arc<Recording>,
    script: Vec<u8>,
    expect_commands: usize,
) -> Result<()> {
    let (client, mut server) = tokio::io::duplex(256 * 1024);

    let feeder = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move {
            let mut sync = [0u8; 6];
            server.read_exact(&mut sync).await.expect("read sync");
            assert_eq!(&sync, b"SYNC\r\n", "driver must send the sync directive");
            server.write_all(&script).await.expect("write script");
            while consumer.command_count() < expect_commands {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            drop(server);
        })
    };

    let result = replica.run(client, consumer).await;
    feeder.await.expect("feeder task");
    result
}

/// Assert that `needle` appears within `haystack` in order (not necessarily
/// contiguously).
pub fn assert_subsequence(haystack: &[ReplicaStatus], needle: &[ReplicaStatus]) {
    let mut it = haystack.iter();
    for expected in needle {
        assert!(
            it.any(|status| status == expected),
            "status {expected:?} missing or out of order in {haystack:?}"
        );
    }
}
