//! Append-only record of keys written during a run, sampled by read operations.

use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{BenchError, Result};

/// Separator between key and member in a composite record
const MEMBER_SEPARATOR: char = ':';

/// A key created by a write operation, optionally paired with a member or field
/// needed to re-issue a point read (`key:member`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRecord(String);

impl KeyRecord {
    /// Record for a bare key (string, list and set operations)
    pub fn key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Record for a key and one of its members (hash and sorted-set operations)
    pub fn composite(key: &str, member: &str) -> Self {
        Self(format!("{}{}{}", key, MEMBER_SEPARATOR, member))
    }

    /// Key part of the record
    pub fn key_part(&self) -> &str {
        self.split().0
    }

    /// Member part of the record, if it is composite
    pub fn member_part(&self) -> Option<&str> {
        self.split().1
    }

    /// Split into key and optional member.
    ///
    /// Generated keys never contain the separator, so the first one delimits the member.
    pub fn split(&self) -> (&str, Option<&str>) {
        match self.0.split_once(MEMBER_SEPARATOR) {
            Some((key, member)) => (key, Some(member)),
            None => (self.0.as_str(), None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared corpus of key records.
///
/// Appends take the write lock; sampling reads the published length and indexes under
/// the read lock, so a sampler never observes a partially appended record.
#[derive(Debug, Default)]
pub struct KeyCorpus {
    records: RwLock<Vec<KeyRecord>>,
    len: AtomicUsize,
}

impl KeyCorpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn append(&self, record: KeyRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.push(record);
        self.len.store(records.len(), Ordering::Release);
    }

    /// Append several records under a single lock acquisition
    pub fn extend(&self, batch: impl IntoIterator<Item = KeyRecord>) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.extend(batch);
        self.len.store(records.len(), Ordering::Release);
    }

    /// Pick a uniformly random record
    pub fn sample_random(&self) -> Result<KeyRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let len = self.len.load(Ordering::Acquire).min(records.len());
        if len == 0 {
            return Err(BenchError::EmptyCorpus);
        }
        let idx = rand::thread_rng().gen_range(0..len);
        Ok(records[idx].clone())
    }

    /// Number of records appended so far
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
