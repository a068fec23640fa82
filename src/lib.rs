// kv-loadgen - Library root for testing

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filler;
pub mod metrics;
pub mod plan;
pub mod report;
pub mod runner;
pub mod store;
pub mod workload;
