//! Window state machine
//!
//! Single-writer state: one live window (buffer + start instant) and the next
//! timer deadline. All methods take `now` explicitly so the machine is pure and
//! testable without a runtime.

use std::time::Duration;

use contracts::{Batch, BatchConfig, FlushReason, SensorRecord, WindowAnchor};
use tokio::time::Instant;

/// Count/time windowed batcher
#[derive(Debug)]
pub struct WindowedBatcher {
    max_batch_size: usize,
    max_window: Duration,
    anchor: WindowAnchor,
    buffer: Vec<SensorRecord>,
    window_start: Instant,
    deadline: Instant,
    next_sequence: u64,
}

impl WindowedBatcher {
    /// Open the first window at `now`
    pub fn new(config: &BatchConfig, now: Instant) -> Self {
        let max_batch_size = config.max_batch_size.max(1);
        let max_window = config.max_window().max(Duration::from_millis(1));
        Self {
            max_batch_size,
            max_window,
            anchor: config.window_anchor,
            buffer: Vec::with_capacity(max_batch_size),
            window_start: now,
            deadline: now + max_window,
            next_sequence: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Next timer deadline
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Append a record; returns the batch when the count threshold is reached
    pub fn push(&mut self, record: SensorRecord, now: Instant) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() < self.max_batch_size {
            return None;
        }

        let batch = self.close(FlushReason::Count, now);
        if self.anchor == WindowAnchor::Flush {
            self.deadline = now + self.max_window;
        }
        Some(batch)
    }

    /// Timer fired; returns the batch when the window is non-empty
    ///
    /// An empty window only re-arms the timer.
    pub fn on_deadline(&mut self, now: Instant) -> Option<Batch> {
        let batch = if self.buffer.is_empty() {
            self.window_start = now;
            None
        } else {
            Some(self.close(FlushReason::Timer, now))
        };
        self.rearm(now);
        batch
    }

    /// Close the current window regardless of thresholds
    pub fn flush(&mut self, reason: FlushReason, now: Instant) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.close(reason, now))
    }

    fn rearm(&mut self, now: Instant) {
        match self.anchor {
            WindowAnchor::Cadence => {
                // Skip ticks missed while the task was busy
                while self.deadline <= now {
                    self.deadline += self.max_window;
                }
            }
            WindowAnchor::Flush => self.deadline = now + self.max_window,
        }
    }

    fn close(&mut self, reason: FlushReason, now: Instant) -> Batch {
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_batch_size));
        let batch = Batch {
            sequence: self.next_sequence,
            opened_at: self.window_start.into_std(),
            reason,
            records,
        };
        self.next_sequence += 1;
        self.window_start = now;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, window_ms: u64, anchor: WindowAnchor) -> BatchConfig {
        BatchConfig {
            max_batch_size: size,
            max_window_ms: window_ms,
            window_anchor: anchor,
            ..Default::default()
        }
    }

    fn record(time: i64) -> SensorRecord {
        SensorRecord::new(0.5, time, "s")
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn times(batch: &Batch) -> Vec<i64> {
        batch.records.iter().map(|r| r.timestamp_millis).collect()
    }

    #[test]
    fn test_count_then_timer_on_cadence() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(2, 1000, WindowAnchor::Cadence), t0);

        assert!(window.push(record(0), t0).is_none());
        let first = window.push(record(50), t0 + ms(50)).unwrap();
        assert_eq!(times(&first), vec![0, 50]);
        assert_eq!(first.reason, FlushReason::Count);
        assert_eq!(first.sequence, 1);

        assert!(window.push(record(900), t0 + ms(900)).is_none());
        // Count flush did not move the cadence
        assert_eq!(window.deadline(), t0 + ms(1000));

        let second = window.on_deadline(t0 + ms(1000)).unwrap();
        assert_eq!(times(&second), vec![900]);
        assert_eq!(second.reason, FlushReason::Timer);
        assert_eq!(second.sequence, 2);
        assert_eq!(window.deadline(), t0 + ms(2000));
    }

    #[test]
    fn test_flush_anchor_rearms_from_flush() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(2, 1000, WindowAnchor::Flush), t0);

        window.push(record(0), t0);
        assert!(window.push(record(50), t0 + ms(50)).is_some());
        assert_eq!(window.deadline(), t0 + ms(1050));

        window.push(record(900), t0 + ms(900));
        let batch = window.on_deadline(t0 + ms(1050)).unwrap();
        assert_eq!(times(&batch), vec![900]);
        assert_eq!(window.deadline(), t0 + ms(2050));
    }

    #[test]
    fn test_empty_window_rearms_without_batch() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(10, 100, WindowAnchor::Cadence), t0);

        assert!(window.on_deadline(t0 + ms(100)).is_none());
        assert_eq!(window.deadline(), t0 + ms(200));
        assert_eq!(window.window_start(), t0 + ms(100));

        window.push(record(1), t0 + ms(150));
        let batch = window.on_deadline(t0 + ms(200)).unwrap();
        // Sequence is not consumed by empty windows
        assert_eq!(batch.sequence, 1);
    }

    #[test]
    fn test_count_wins_on_triggering_append() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(2, 100, WindowAnchor::Cadence), t0);

        window.push(record(1), t0 + ms(10));
        // Second record lands exactly on the deadline
        let batch = window.push(record(2), t0 + ms(100)).unwrap();
        assert_eq!(batch.reason, FlushReason::Count);
        assert!(window.on_deadline(t0 + ms(100)).is_none());
    }

    #[test]
    fn test_late_timer_skips_missed_ticks() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(10, 100, WindowAnchor::Cadence), t0);
        window.push(record(1), t0);
        assert!(window.on_deadline(t0 + ms(350)).is_some());
        assert_eq!(window.deadline(), t0 + ms(400));
    }

    #[test]
    fn test_flush_reason_and_empty_flush() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(10, 100, WindowAnchor::Cadence), t0);
        assert!(window.flush(FlushReason::Shutdown, t0).is_none());

        window.push(record(1), t0);
        let batch = window.flush(FlushReason::Shutdown, t0 + ms(5)).unwrap();
        assert_eq!(batch.reason, FlushReason::Shutdown);
        assert!(window.is_empty());
    }

    #[test]
    fn test_batch_never_exceeds_max() {
        let t0 = Instant::now();
        let mut window = WindowedBatcher::new(&config(3, 1000, WindowAnchor::Cadence), t0);
        let mut batches = Vec::new();
        for i in 0..10 {
            if let Some(b) = window.push(record(i), t0 + ms(i as u64)) {
                batches.push(b);
            }
        }
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 3));
        assert_eq!(window.len(), 1);
    }
}
