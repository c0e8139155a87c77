//! Cooperative yield points at fixed byte intervals.

/// Default distance between yield points: 1 MiB.
pub const DEFAULT_YIELD_INTERVAL: u64 = 1024 * 1024;

/// Decides whether a transfer at `transferred` bytes should yield.
///
/// Returns the decision and the next threshold. The threshold only ever moves
/// forward by `interval` from its previous value, so a chunk that jumps over
/// several thresholds yields once now and again on each following call until
/// the threshold has caught up.
pub fn should_yield(transferred: u64, next_yield_position: u64, interval: u64) -> (bool, u64) {
    if transferred >= next_yield_position {
        (true, next_yield_position.saturating_add(interval.max(1)))
    } else {
        (false, next_yield_position)
    }
}

/// Yields to the tokio scheduler every `interval` bytes.
///
/// On a multi-threaded runtime the yield is a cheap rescheduling point; on a
/// current-thread runtime it is what lets other transfers make progress.
#[derive(Debug, Clone)]
pub struct CooperativeYielder {
    interval: u64,
    next_yield_position: u64,
}

impl CooperativeYielder {
    pub fn new(interval: u64) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            next_yield_position: interval,
        }
    }

    pub fn next_yield_position(&self) -> u64 {
        self.next_yield_position
    }

    /// Yields if `transferred` crossed the current threshold. Returns whether it did.
    pub async fn checkpoint(&mut self, transferred: u64) -> bool {
        let (yield_now, next) = should_yield(transferred, self.next_yield_position, self.interval);
        self.next_yield_position = next;
        if yield_now {
            tokio::task::yield_now().await;
        }
        yield_now
    }
}

impl Default for CooperativeYielder {
    fn default() -> Self {
        Self::new(DEFAULT_YIELD_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_keeps_position() {
        assert_eq!(should_yield(100, 1024, 1024), (false, 1024));
    }

    #[test]
    fn at_threshold_advances_by_interval() {
        assert_eq!(should_yield(1024, 1024, 1024), (true, 2048));
    }

    #[test]
    fn overshoot_advances_from_previous_threshold() {
        // Jumped past three thresholds in one chunk: one yield now, the
        // threshold moves from 1024 (not from 3500).
        let (yielded, next) = should_yield(3500, 1024, 1024);
        assert!(yielded);
        assert_eq!(next, 2048);

        // Following calls keep yielding until the threshold catches up.
        assert_eq!(should_yield(3600, next, 1024), (true, 3072));
        assert_eq!(should_yield(3700, 3072, 1024), (true, 4096));
        assert_eq!(should_yield(3800, 4096, 1024), (false, 4096));
    }

    #[test]
    fn yields_at_least_once_per_interval() {
        let interval = 1024 * 1024;
        let chunk = 8 * 1024;
        let total = 10 * interval;
        let mut next = interval;
        let mut yields = 0;
        let mut transferred = 0;
        while transferred < total {
            transferred += chunk;
            let (yielded, new_next) = should_yield(transferred, next, interval);
            if yielded {
                assert!(new_next > next);
                yields += 1;
            }
            next = new_next;
        }
        assert_eq!(yields, total / interval);
    }

    #[test]
    fn zero_interval_still_moves_forward() {
        assert_eq!(should_yield(5, 5, 0), (true, 6));
    }

    #[tokio::test]
    async fn checkpoint_tracks_threshold() {
        let mut yielder = CooperativeYielder::new(100);
        assert!(!yielder.checkpoint(50).await);
        assert!(yielder.checkpoint(100).await);
        assert_eq!(yielder.next_yield_position(), 200);
        assert!(!yielder.checkpoint(150).await);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn yielding_lets_other_tasks_run() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        tokio::spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        let mut yielder = CooperativeYielder::new(1);
        yielder.checkpoint(1).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
