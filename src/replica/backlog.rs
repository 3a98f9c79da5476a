//! The backlog: a bounded FIFO buffering live commands while the snapshot
//! is still being decoded.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::model::command::Command;

/// Bounded multi-producer / single-consumer command queue.
///
/// `push` never blocks: when the queue already holds `capacity` commands it
/// fails with [`Error::BacklogOverflow`], because silently dropping
/// replicated commands would lose data. `pop` waits until a command
/// arrives. Insertion order is preserved exactly.
#[derive(Debug)]
pub struct Backlog {
    queue: Mutex<VecDeque<Command>>,
    notify: Notify,
    capacity: usize,
}

impl Backlog {
    /// Create a backlog holding at most `capacity` commands.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append a command. Fails without blocking when the backlog is full.
    pub fn push(&self, command: Command) -> Result<()> {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                return Err(Error::BacklogOverflow);
            }
            queue.push_back(command);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Remove and return the oldest command, waiting for one if the backlog
    /// is empty.
    pub async fn pop(&self) -> Command {
        loop {
            // Register for notification before re-checking the queue, so a
            // push between the check and the await cannot be missed.
            let notified = self.notify.notified();
            if let Some(command) = self.queue.lock().pop_front() {
                return command;
            }
            notified.await;
        }
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when no commands are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
