//! Target store capability surface: single calls and pipelined batches.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;
use crate::workload::Command;

pub mod mock;
pub mod redis_store;

pub use mock::{MockStore, MockStoreConfig};
pub use redis_store::RedisStore;

/// A key-value store the workload can be driven against.
///
/// Implementations must be safe to share across all workers. Replies are never
/// inspected; only whether the call completed without error.
pub trait Store: Send + Sync + 'static {
    /// Issue one command
    fn execute(&self, command: Command) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Send every queued command in one round trip
    fn commit(&self, pipeline: Pipeline) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Commands queued for a single pipelined round trip
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Start an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue a command
    pub fn enqueue(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether any queued command mutates the store
    pub fn has_writes(&self) -> bool {
        self.commands.iter().any(Command::is_write)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

/// Per-call timeouts, distinct for reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub read: Duration,
    pub write: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_millis(500),
            write: Duration::from_millis(200),
        }
    }
}

impl StoreTimeouts {
    /// Timeout for a single command
    pub fn for_command(&self, command: &Command) -> Duration {
        if command.is_write() {
            self.write
        } else {
            self.read
        }
    }

    /// Timeout for a pipeline; any write makes it a write batch
    pub fn for_pipeline(&self, pipeline: &Pipeline) -> Duration {
        if pipeline.has_writes() {
            self.write
        } else {
            self.read
        }
    }
}
