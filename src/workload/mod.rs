//! Workload engine: operation catalog, synthetic key/value generation and the
//! read-after-write key corpus.

pub mod catalog;
pub mod command;
pub mod corpus;

pub use catalog::{lookup, OpKind, OperationDescriptor, WorkloadContext};
pub use command::Command;
pub use corpus::{KeyCorpus, KeyRecord};
