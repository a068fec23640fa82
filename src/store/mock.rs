//! In-memory store that counts calls instead of storing data.
//!
//! Used by tests and dry runs; latency and failures can be simulated.

use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{Pipeline, Store};
use crate::error::StoreError;
use crate::workload::Command;

/// Behaviour of the mock store
#[derive(Debug, Clone, Default)]
pub struct MockStoreConfig {
    /// Simulated latency per call or per commit
    pub latency: Duration,
    /// Error rate (0.0 to 1.0) applied to calls and commits
    pub error_rate: f64,
}

/// Store that records what it was asked to do
#[derive(Debug, Default)]
pub struct MockStore {
    config: MockStoreConfig,
    /// Commands seen, by verb (pipelined commands included)
    commands: DashMap<&'static str, u64>,
    single_calls: AtomicU64,
    commits: AtomicU64,
    failures: AtomicU64,
}

impl MockStore {
    pub fn new(config: MockStoreConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Number of commands seen with the given verb
    pub fn command_count(&self, verb: &str) -> u64 {
        self.commands.get(verb).map(|count| *count).unwrap_or(0)
    }

    /// Total commands seen across all verbs
    pub fn total_commands(&self) -> u64 {
        self.commands.iter().map(|entry| *entry.value()).sum()
    }

    /// Un-pipelined calls received
    pub fn single_calls(&self) -> u64 {
        self.single_calls.load(Ordering::Relaxed)
    }

    /// Pipeline commits received
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Calls and commits that were made to fail
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record(&self, command: &Command) {
        *self.commands.entry(command.verb()).or_insert(0) += 1;
    }

    async fn respond(&self) -> Result<(), StoreError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let fail = self.config.error_rate > 0.0
            && rand::thread_rng().gen::<f64>() < self.config.error_rate;
        if fail {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Rejected("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl Store for MockStore {
    async fn execute(&self, command: Command) -> Result<(), StoreError> {
        self.single_calls.fetch_add(1, Ordering::Relaxed);
        self.record(&command);
        self.respond().await
    }

    async fn commit(&self, pipeline: Pipeline) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::Relaxed);
        for command in pipeline.commands() {
            self.record(command);
        }
        self.respond().await
    }
}
