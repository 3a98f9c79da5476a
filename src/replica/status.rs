//! Replication lifecycle events.

/// Lifecycle events delivered to
/// [`Consumer::replica_status`](crate::Consumer::replica_status).
///
/// `Connect`, `Reconnect` and `Disconnect` belong to the outer supervisor
/// that owns the dial/retry loop; the driver itself emits the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaStatus {
    /// Connecting to the server.
    Connect,
    /// Reconnecting after a broken session.
    Reconnect,
    /// The server connection was closed.
    Disconnect,
    /// The sync directive is being sent.
    StartSync,
    /// The snapshot payload is being streamed to the cache file.
    StartCacheRdb,
    /// The snapshot payload has been fully cached.
    StopCacheRdb,
    /// The cached snapshot is not being decoded (`read_rdb` disabled).
    SkipReadRdb,
    /// Snapshot decoding started.
    StartReadRdb,
    /// Snapshot decoding finished.
    StopReadRdb,
    /// The backlog drain started.
    StartReadBacklog,
    /// The decode task stopped.
    StopDecoder,
    /// The replication session stopped.
    StopReplication,
}

impl std::fmt::Display for ReplicaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Reconnect => "reconnect",
            Self::Disconnect => "disconnect",
            Self::StartSync => "start_sync",
            Self::StartCacheRdb => "start_cache_rdb",
            Self::StopCacheRdb => "stop_cache_rdb",
            Self::SkipReadRdb => "skip_read_rdb",
            Self::StartReadRdb => "start_read_rdb",
            Self::StopReadRdb => "stop_read_rdb",
            Self::StartReadBacklog => "start_read_backlog",
            Self::StopDecoder => "stop_decoder",
            Self::StopReplication => "stop_replication",
        };
        f.write_str(name)
    }
}
