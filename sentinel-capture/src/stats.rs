//! Capture statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot of a capture session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStats {
    /// Frames read from the capture handle
    pub frames_captured: u64,
    /// Frames handed to the consumer
    pub frames_forwarded: u64,
    /// Bytes read from the capture handle
    pub bytes_captured: u64,
    /// Read errors (other than timeouts)
    pub read_errors: u64,
    /// Session duration
    pub duration: Duration,
}

impl CaptureStats {
    /// Frames read but never delivered (queue closed while they were pending)
    pub fn frames_undelivered(&self) -> u64 {
        self.frames_captured.saturating_sub(self.frames_forwarded)
    }

    /// Format statistics as a single log line
    pub fn format(&self) -> String {
        format!(
            "captured {} frames ({} bytes), forwarded {}, {} undelivered, {} read errors in {:.1}s",
            self.frames_captured,
            self.bytes_captured,
            self.frames_forwarded,
            self.frames_undelivered(),
            self.read_errors,
            self.duration.as_secs_f64()
        )
    }
}

/// Thread-safe statistics accumulator, shared with the producer thread
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    frames_captured: Arc<AtomicU64>,
    frames_forwarded: Arc<AtomicU64>,
    bytes_captured: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            frames_captured: Arc::new(AtomicU64::new(0)),
            frames_forwarded: Arc::new(AtomicU64::new(0)),
            bytes_captured: Arc::new(AtomicU64::new(0)),
            read_errors: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_captured(&self, size: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            duration: self.start_time.elapsed(),
        }
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_accumulator_counts() {
        let acc = StatsAccumulator::new();
        acc.record_captured(342);
        acc.record_captured(590);
        acc.record_forwarded();
        acc.record_error();

        let stats = acc.snapshot();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.bytes_captured, 932);
        assert_eq!(stats.frames_forwarded, 1);
        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.frames_undelivered(), 1);
    }

    #[test]
    fn test_accumulator_shared_across_threads() {
        let acc = StatsAccumulator::new();
        let producer = acc.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                producer.record_captured(64);
                producer.record_forwarded();
            }
        });
        handle.join().unwrap();

        let stats = acc.snapshot();
        assert_eq!(stats.frames_captured, 100);
        assert_eq!(stats.frames_forwarded, 100);
        assert_eq!(stats.bytes_captured, 6400);
    }

    #[test]
    fn test_format() {
        let stats = CaptureStats {
            frames_captured: 12,
            frames_forwarded: 11,
            bytes_captured: 4104,
            read_errors: 0,
            duration: Duration::from_secs(30),
        };
        let line = stats.format();
        assert!(line.contains("captured 12 frames"));
        assert!(line.contains("4104 bytes"));
        assert!(line.contains("forwarded 11, 1 undelivered"));
    }
}
