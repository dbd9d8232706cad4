//! Run statistics tracking.
//!
//! Counters are updated concurrently by worker tasks; the failed-ID set
//! feeds the end-of-run retry pass.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counters for one pipeline run.
#[derive(Debug, Default)]
pub struct EtlStats {
    successful: AtomicUsize,
    failed: AtomicUsize,
    /// Pokédex IDs that failed, for the retry pass. Kept in lockstep with
    /// the `failed` counter.
    failed_ids: Mutex<HashSet<i32>>,
}

impl EtlStats {
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, pokedex_id: i32) {
        let mut ids = self.failed_ids.lock();
        if ids.insert(pokedex_id) {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drain the failed set for a retry pass, resetting the failure counter.
    /// IDs that fail again are re-recorded by the retry pass itself.
    pub fn take_failures(&self) -> Vec<i32> {
        let mut ids = self.failed_ids.lock();
        let drained: Vec<i32> = ids.drain().collect();
        self.failed.store(0, Ordering::Relaxed);
        drained
    }

    pub fn snapshot(&self) -> EtlStatsSnapshot {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let mut failed_ids: Vec<i32> = self.failed_ids.lock().iter().copied().collect();
        failed_ids.sort_unstable();

        EtlStatsSnapshot {
            total_processed: successful + failed,
            successful,
            failed,
            failed_ids,
        }
    }
}

/// Point-in-time view of the counters. `total_processed` is derived from the
/// other two, so the three fields are always coherent even while workers are
/// still updating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlStatsSnapshot {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub failed_ids: Vec<i32>,
}

impl EtlStatsSnapshot {
    pub fn outcome(&self) -> RunOutcome {
        if self.failed == 0 {
            RunOutcome::Success
        } else if self.failed * 2 >= self.total_processed {
            RunOutcome::Failed
        } else {
            RunOutcome::Degraded
        }
    }
}

/// Overall verdict for a run, derived from the final counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every entity loaded.
    Success,
    /// Some entities failed permanently, but most loaded.
    Degraded,
    /// Half or more of the entities failed.
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::Degraded => write!(f, "degraded"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_total_from_counters() {
        let stats = EtlStats::default();
        stats.record_success();
        stats.record_success();
        stats.record_failure(7);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successful, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.total_processed, 3);
        assert_eq!(snapshot.failed_ids, vec![7]);
    }

    #[test]
    fn duplicate_failures_count_once() {
        let stats = EtlStats::default();
        stats.record_failure(7);
        stats.record_failure(7);

        assert_eq!(stats.snapshot().failed, 1);
    }

    #[test]
    fn take_failures_resets_failure_state() {
        let stats = EtlStats::default();
        stats.record_failure(3);
        stats.record_failure(9);

        let mut drained = stats.take_failures();
        drained.sort_unstable();
        assert_eq!(drained, vec![3, 9]);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 0);
        assert!(snapshot.failed_ids.is_empty());
    }

    #[test]
    fn outcome_reflects_counters() {
        let all_good = EtlStatsSnapshot {
            total_processed: 2,
            successful: 2,
            failed: 0,
            failed_ids: vec![],
        };
        assert_eq!(all_good.outcome(), RunOutcome::Success);

        let partial = EtlStatsSnapshot {
            total_processed: 3,
            successful: 2,
            failed: 1,
            failed_ids: vec![4],
        };
        assert_eq!(partial.outcome(), RunOutcome::Degraded);

        let half = EtlStatsSnapshot {
            total_processed: 2,
            successful: 1,
            failed: 1,
            failed_ids: vec![4],
        };
        assert_eq!(half.outcome(), RunOutcome::Failed);
    }
}
