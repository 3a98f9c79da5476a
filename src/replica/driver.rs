//! The replication driver: a state machine that owns the socket for the
//! lifetime of the session.
//!
//! After the sync directive is sent, the wire carries a snapshot header,
//! the raw snapshot payload, and then framed live commands. The driver
//! streams the payload to the cache file and spawns a concurrent decode
//! task over it; meanwhile the framing loop keeps the socket drained,
//! pushing live commands into the backlog so the master never stalls on a
//! slow consumer. The decode task delivers every snapshot key, then drains
//! the backlog, which is how snapshot keys are guaranteed to reach the
//! consumer before any live command.
//!
//! Cancellation is cooperative and shared: the framing loop, the decode
//! task, and the host all observe one session token. The first error wins
//! and is retained for the [`err()`](Replica::err) query.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufWriter};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReplicaConfig;
use crate::consumer::Consumer;
use crate::error::{Error, Result};
use crate::model::command::CommandKind;
use crate::rdb::Decoder;
use crate::replica::backlog::Backlog;
use crate::replica::connection::{Connection, Message};
use crate::replica::status::ReplicaStatus;

/// Shared session state: the cancellation token and the first error.
#[derive(Debug, Default)]
struct SessionState {
    cancelled: AtomicBool,
    notify: Notify,
    err: Mutex<Option<Error>>,
}

impl SessionState {
    /// Trip the token. The first recorded error is kept; later ones are
    /// dropped.
    fn cancel(&self, err: Option<Error>) {
        if let Some(err) = err {
            let mut slot = self.err.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn err(&self) -> Option<Error> {
        self.err.lock().clone()
    }
}

/// A logical replication session.
///
/// One `Replica` drives one session over one socket; the host owns the dial
/// and the reconnect policy. See the crate docs for a usage sketch.
#[derive(Debug)]
pub struct Replica {
    config: ReplicaConfig,
    backlog: Arc<Backlog>,
    state: Arc<SessionState>,
}

impl Replica {
    pub fn new(config: ReplicaConfig) -> Self {
        let backlog = Arc::new(Backlog::new(config.backlog_size));
        Self {
            config,
            backlog,
            state: Arc::new(SessionState::default()),
        }
    }

    /// The backlog, shared for observability (queue depth monitoring).
    pub fn backlog(&self) -> Arc<Backlog> {
        Arc::clone(&self.backlog)
    }

    /// The error that ended the session, if any.
    pub fn err(&self) -> Option<Error> {
        self.state.err()
    }

    /// True while the session has not been cancelled.
    pub fn is_running(&self) -> bool {
        !self.state.is_cancelled()
    }

    /// Request a clean cancellation of the session.
    pub fn cancel(&self) {
        self.state.cancel(None);
    }

    /// Wait until the session has stopped.
    pub async fn done(&self) {
        self.state.cancelled().await;
    }

    /// Run the session over `stream`, delivering to `consumer` until the
    /// socket closes, an error occurs, or the session is cancelled.
    ///
    /// Returns the originating error on failure. Snapshot keys are always
    /// delivered before backlog commands; each key and command is delivered
    /// at most once.
    pub async fn run<S, C>(&self, stream: S, consumer: Arc<C>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: Consumer,
    {
        let mut decode_task = None;
        let result = self
            .drive(stream, Arc::clone(&consumer), &mut decode_task)
            .await;

        self.state.cancel(result.err());
        if let Some(task) = decode_task {
            if let Err(join_err) = task.await {
                warn!(%join_err, "decode task aborted");
            }
        }

        let err = self.state.err();
        consumer.cancel(err.as_ref());
        consumer.replica_status(ReplicaStatus::StopReplication);
        info!(err = ?err, "replication session stopped");
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The framing loop (master → driver direction).
    async fn drive<S, C>(
        &self,
        stream: S,
        consumer: Arc<C>,
        decode_task: &mut Option<JoinHandle<()>>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: Consumer,
    {
        let mut conn = Connection::new(stream);
        if self.config.debug {
            conn.enable_debug_dump(&self.config.debug_dump_dir)?;
        }

        consumer.replica_status(ReplicaStatus::StartSync);
        conn.send_sync().await?;

        let mut snapshot_seen = false;
        loop {
            let message = tokio::select! {
                _ = self.state.cancelled() => return Ok(()),
                message = conn.next_message() => message?,
            };

            match message {
                Message::Keepalive => continue,
                Message::Snapshot(len) => {
                    if snapshot_seen {
                        return Err(Error::protocol("unexpected second snapshot header"));
                    }
                    snapshot_seen = true;

                    consumer.replica_status(ReplicaStatus::StartCacheRdb);
                    self.cache_snapshot(&mut conn, len).await?;
                    consumer.replica_status(ReplicaStatus::StopCacheRdb);
                    debug!(bytes = len, file = %self.config.cache_rdb_file.display(), "snapshot cached");

                    *decode_task = Some(tokio::spawn(decode_and_drain(
                        self.config.clone(),
                        Arc::clone(&self.backlog),
                        Arc::clone(&consumer),
                        Arc::clone(&self.state),
                    )));
                }
                Message::Command(command) => match command.kind() {
                    CommandKind::Empty => continue,
                    // Control commands bypass the admission filter: losing a
                    // select would corrupt database attribution downstream.
                    CommandKind::Ping | CommandKind::Select => self.backlog.push(command)?,
                    _ => {
                        if consumer.check_command(&command) {
                            self.backlog.push(command)?;
                        }
                    }
                },
            }
        }
    }

    /// Stream the announced snapshot payload into the cache file, creating
    /// the containing directory and replacing any prior copy.
    async fn cache_snapshot<S>(&self, conn: &mut Connection<S>, len: u64) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let path = &self.config.cache_rdb_file;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let file = tokio::fs::File::create(path).await?;
        let mut writer = BufWriter::new(file);
        conn.copy_snapshot(len, &mut writer).await
    }
}

/// The decode task: read the cached snapshot (unless configured away), then
/// drain the backlog until the session is cancelled.
async fn decode_and_drain<C: Consumer>(
    config: ReplicaConfig,
    backlog: Arc<Backlog>,
    consumer: Arc<C>,
    state: Arc<SessionState>,
) {
    let result = run_decoder(&config, &backlog, consumer.as_ref(), &state).await;
    match result {
        Err(Error::Cancelled) => state.cancel(None),
        Err(err) => state.cancel(Some(err)),
        Ok(()) => state.cancel(None),
    }
    consumer.replica_status(ReplicaStatus::StopDecoder);
}

async fn run_decoder<C: Consumer>(
    config: &ReplicaConfig,
    backlog: &Backlog,
    consumer: &C,
    state: &SessionState,
) -> Result<()> {
    if config.read_rdb {
        consumer.replica_status(ReplicaStatus::StartReadRdb);
        let file = tokio::fs::File::open(&config.cache_rdb_file).await?;
        let mut decoder = Decoder::new(tokio::io::BufReader::new(file));

        let mut keys = 0u64;
        loop {
            if state.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match decoder.next_key().await? {
                Some(key) => {
                    consumer.key(key).map_err(as_consumer_error)?;
                    keys += 1;
                }
                None => break,
            }
        }
        consumer.replica_status(ReplicaStatus::StopReadRdb);
        info!(keys, "snapshot decoded");
    } else {
        consumer.replica_status(ReplicaStatus::SkipReadRdb);
    }

    consumer.replica_status(ReplicaStatus::StartReadBacklog);
    loop {
        let command = tokio::select! {
            _ = state.cancelled() => return Err(Error::Cancelled),
            command = backlog.pop() => command,
        };
        consumer.command(command).map_err(as_consumer_error)?;
    }
}

/// Errors coming back from consumer callbacks surface under the consumer
/// kind, whatever the callback chose to return.
fn as_consumer_error(err: Error) -> Error {
    match err {
        Error::Consumer(_) => err,
        other => Error::Consumer(other.to_string()),
    }
}
