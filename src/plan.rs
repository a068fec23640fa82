//! Run plan: how the request budget is divided across workers and pipeline rounds.

use serde::{Deserialize, Serialize};

/// Number of samples gathered into one metrics batch before it is flushed
pub const FLUSH_BATCH_SIZE: usize = 100;

/// Parameters of one benchmark run, derived once from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// Requested total number of store calls
    pub total_requests: usize,
    /// Requested pipeline depth (0 disables pipelining)
    pub pipeline_depth: usize,
    /// Size of the key namespace write operations draw from
    pub unique_key_budget: usize,
    /// Value payload size in bytes
    pub payload_size: usize,
}

/// Per-worker share of a run plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSplit {
    /// Store calls assigned to each worker (integer division of the total)
    pub per_worker: usize,
    /// Units of work each worker performs; one unit yields one sample
    pub rounds: usize,
    /// Calls bundled into each round; 0 means un-pipelined
    pub pipeline: usize,
}

/// Split one worker's share into rounds of `requested_pipeline` calls.
///
/// The pipeline depth is capped at the worker's share. With pipelining the round count
/// is rounded up so no call is lost; without it every call is its own round.
pub fn split_work(per_worker: usize, requested_pipeline: usize) -> WorkSplit {
    let pipeline = per_worker.min(requested_pipeline);
    let rounds = if pipeline > 0 {
        per_worker.div_ceil(pipeline)
    } else {
        per_worker
    };

    WorkSplit {
        per_worker,
        rounds,
        pipeline,
    }
}

impl RunPlan {
    /// Work split shared by every worker of this plan
    pub fn work_split(&self) -> WorkSplit {
        let per_worker = if self.worker_count == 0 {
            0
        } else {
            self.total_requests / self.worker_count
        };
        split_work(per_worker, self.pipeline_depth)
    }

    /// Whether rounds are sent as pipelined batches
    pub fn is_pipelined(&self) -> bool {
        self.work_split().pipeline > 0
    }

    /// Store calls that will actually be issued across all workers
    pub fn scheduled_calls(&self) -> usize {
        let split = self.work_split();
        split.rounds * split.pipeline.max(1) * self.worker_count
    }

    /// Samples the workers will produce, one per round
    pub fn expected_samples(&self) -> usize {
        self.work_split().rounds * self.worker_count
    }

    /// Flush completions the orchestrator waits for.
    ///
    /// The final partial batch is never flushed, so only full batches count.
    pub fn expected_flushes(&self) -> u64 {
        (self.expected_samples() / FLUSH_BATCH_SIZE) as u64
    }

    /// Samples left in the final partial batch once every worker has finished
    pub fn expected_remainder(&self) -> usize {
        self.expected_samples() % FLUSH_BATCH_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan(worker_count: usize, total_requests: usize, pipeline_depth: usize) -> RunPlan {
        RunPlan {
            worker_count,
            total_requests,
            pipeline_depth,
            unique_key_budget: total_requests.max(1),
            payload_size: 0,
        }
    }

    #[test]
    fn test_unpipelined_split() {
        let split = split_work(100, 0);
        assert_eq!(split.rounds, 100);
        assert_eq!(split.pipeline, 0);
    }

    #[test]
    fn test_pipeline_capped_at_share() {
        let split = split_work(7, 50);
        assert_eq!(split.pipeline, 7);
        assert_eq!(split.rounds, 1);
    }

    #[test]
    fn test_pipeline_rounds_up() {
        let split = split_work(25, 10);
        assert_eq!(split.pipeline, 10);
        assert_eq!(split.rounds, 3);
    }

    #[test]
    fn test_four_workers_unpipelined() {
        let p = plan(4, 400, 0);
        assert_eq!(p.work_split().rounds, 100);
        assert_eq!(p.expected_samples(), 400);
        assert_eq!(p.expected_flushes(), 4);
        assert_eq!(p.expected_remainder(), 0);
    }

    #[test]
    fn test_five_workers_pipelined() {
        let p = plan(5, 1000, 10);
        let split = p.work_split();
        assert_eq!(split.per_worker, 200);
        assert_eq!(split.rounds, 20);
        assert_eq!(split.pipeline, 10);
        assert_eq!(p.expected_samples(), 100);
        assert_eq!(p.expected_flushes(), 1);
        assert!(p.is_pipelined());
    }

    #[test]
    fn test_uneven_division_drops_remainder() {
        let p = plan(5, 37, 0);
        assert_eq!(p.work_split().per_worker, 7);
        assert_eq!(p.scheduled_calls(), 35);
        assert_eq!(p.expected_flushes(), 0);
        assert_eq!(p.expected_remainder(), 35);
    }

    #[test]
    fn test_fewer_requests_than_workers() {
        let p = plan(8, 5, 3);
        let split = p.work_split();
        assert_eq!(split.per_worker, 0);
        assert_eq!(split.rounds, 0);
        assert_eq!(p.expected_samples(), 0);
    }

    proptest! {
        #[test]
        fn prop_split_never_loses_calls(per_worker in 0usize..10_000, pipeline in 0usize..500) {
            let split = split_work(per_worker, pipeline);
            prop_assert!(split.rounds * split.pipeline.max(1) >= per_worker);
            if split.pipeline > 0 {
                prop_assert!(split.rounds * split.pipeline < per_worker + split.pipeline);
            }
        }

        #[test]
        fn prop_exact_when_divisible(workers in 1usize..64, per_worker in 1usize..500, depth in 1usize..50) {
            let per_worker = per_worker * depth;
            let p = plan(workers, per_worker * workers, depth);
            prop_assert_eq!(p.scheduled_calls(), p.total_requests);
        }

        #[test]
        fn prop_overshoot_bounded(workers in 1usize..64, total in 0usize..100_000, depth in 0usize..64) {
            let p = plan(workers, total, depth);
            let per_worker_total = (total / workers) * workers;
            prop_assert!(p.scheduled_calls() >= per_worker_total);
            prop_assert!(p.scheduled_calls() <= per_worker_total + workers * depth);
        }
    }
}
