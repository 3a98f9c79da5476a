//! Replication session configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a [`Replica`](crate::replica::Replica) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Whether to decode the snapshot after caching it. When `false` the
    /// decode task skips straight to the backlog drain; the snapshot bytes
    /// are still written to disk and can be decoded later. Supervisors
    /// typically force this back to `true` on every reconnect so each
    /// attempt refreshes from a fresh snapshot.
    #[serde(default = "default_read_rdb")]
    pub read_rdb: bool,

    /// Whether to retain the cache file after decoding (reserved; the
    /// snapshot is always written to `cache_rdb_file`).
    #[serde(default = "default_cache_rdb")]
    pub cache_rdb: bool,

    /// Location of the snapshot cache file. The parent directory is created
    /// if missing and any prior copy is removed before streaming.
    #[serde(default = "default_cache_rdb_file")]
    pub cache_rdb_file: PathBuf,

    /// Maximum number of live commands held in the backlog while the
    /// snapshot is decoded. Overflow is fatal to the session.
    #[serde(default = "default_backlog_size")]
    pub backlog_size: usize,

    /// When enabled, the bytes of each framed command are teed into a
    /// buffer and dumped to `debug_dump_dir` on parse error.
    #[serde(default)]
    pub debug: bool,

    /// Directory for protocol dump files (`debug` mode only).
    #[serde(default = "default_debug_dump_dir")]
    pub debug_dump_dir: PathBuf,
}

fn default_read_rdb() -> bool {
    true
}

fn default_cache_rdb() -> bool {
    true
}

fn default_cache_rdb_file() -> PathBuf {
    PathBuf::from("cache/replica.rdb")
}

fn default_backlog_size() -> usize {
    50_000_000
}

fn default_debug_dump_dir() -> PathBuf {
    PathBuf::from("cache/dumps")
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            read_rdb: default_read_rdb(),
            cache_rdb: default_cache_rdb(),
            cache_rdb_file: default_cache_rdb_file(),
            backlog_size: default_backlog_size(),
            debug: false,
            debug_dump_dir: default_debug_dump_dir(),
        }
    }
}
