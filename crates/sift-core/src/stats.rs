use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Thread-safe pipeline counters, shared across a worker pool via `Arc`
/// and injected explicitly into each worker. No ambient global state.
///
/// All increments are atomic; `processing` is a gauge that tracks
/// jobs currently in flight.
#[derive(Debug, Default)]
pub struct PipelineStats {
    queued: AtomicU64,
    processing: AtomicI64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    sent_to_scoring: AtomicU64,
    enqueue_failed: AtomicU64,
    sink_failed: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_processing(&self) {
        self.processing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stop_processing(&self) {
        self.processing.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent_to_scoring(&self) {
        self.sent_to_scoring.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueue_failed(&self) {
        self.enqueue_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failed(&self) {
        self.sink_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy for operator display.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            processing: self.processing.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            sent_to_scoring: self.sent_to_scoring.load(Ordering::Relaxed),
            enqueue_failed: self.enqueue_failed.load(Ordering::Relaxed),
            sink_failed: self.sink_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queued: u64,
    pub processing: i64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub sent_to_scoring: u64,
    pub enqueue_failed: u64,
    pub sink_failed: u64,
}

impl StatsSnapshot {
    /// Completed share of finished work, in percent.
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.completed + self.failed;
        if finished == 0 {
            None
        } else {
            Some(self.completed as f64 / finished as f64 * 100.0)
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={} processing={} completed={} failed={} skipped={} \
             sent_to_scoring={} enqueue_failed={} sink_failed={}",
            self.queued,
            self.processing,
            self.completed,
            self.failed,
            self.skipped,
            self.sent_to_scoring,
            self.enqueue_failed,
            self.sink_failed
        )?;
        if let Some(rate) = self.success_rate() {
            write!(f, " success_rate={rate:.1}%")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = PipelineStats::new();
        stats.record_completed();
        stats.record_completed();
        stats.record_failed();
        stats.record_skipped();

        let snap = stats.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.success_rate(), Some(200.0 / 3.0));
    }

    #[test]
    fn test_processing_gauge_goes_up_and_down() {
        let stats = PipelineStats::new();
        stats.start_processing();
        stats.start_processing();
        stats.stop_processing();
        assert_eq!(stats.snapshot().processing, 1);
    }

    #[test]
    fn test_success_rate_undefined_before_any_finish() {
        assert_eq!(PipelineStats::new().snapshot().success_rate(), None);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let stats = Arc::new(PipelineStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    stats.record_completed();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(stats.snapshot().completed, 800);
    }

    #[test]
    fn test_display_includes_rate_once_finished() {
        let stats = PipelineStats::new();
        stats.record_completed();
        let text = stats.snapshot().to_string();
        assert!(text.contains("completed=1"));
        assert!(text.contains("success_rate=100.0%"));
    }
}
