//! Per-subscription frame counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Health metrics for a subscription
///
/// Updated from the source's delivery thread, read from the UI thread.
/// All fields use atomic operations for thread-safe access.
#[derive(Debug)]
pub struct SubscriptionHealth {
    /// Frames handed to the delegate by the source
    frames_received: AtomicU64,

    /// Frames converted and published into the sink
    frames_published: AtomicU64,

    /// Frames dropped because their planes failed validation
    malformed_frames: AtomicU64,

    /// Frames dropped because they arrived after unsubscribe or after the sink was torn down
    stale_frames: AtomicU64,

    /// Total bytes of raw plane data received
    bytes_received: AtomicU64,

    /// Timestamp (as Unix microseconds) of the last published frame
    last_frame_time: AtomicU64,
}

impl SubscriptionHealth {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            stale_frames: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(now_micros()),
        }
    }

    /// Record a frame delivered by the source
    pub fn record_received(&self, size: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Record a published frame, returns the new published count
    pub fn record_published(&self) -> u64 {
        self.last_frame_time.store(now_micros(), Ordering::Relaxed);
        self.frames_published.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a malformed frame, returns the new malformed count
    pub fn record_malformed(&self) -> u64 {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a frame that arrived while inactive
    pub fn record_stale(&self) {
        self.stale_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames.load(Ordering::Relaxed)
    }

    pub fn stale_frames(&self) -> u64 {
        self.stale_frames.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Get the timestamp of the last published frame (Unix microseconds)
    pub fn last_frame_time(&self) -> u64 {
        self.last_frame_time.load(Ordering::Relaxed)
    }

    /// Check if no frame has been published for the given duration
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let elapsed_micros = now_micros().saturating_sub(self.last_frame_time());
        elapsed_micros > threshold.as_micros() as u64
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_received: self.frames_received(),
            frames_published: self.frames_published(),
            malformed_frames: self.malformed_frames(),
            stale_frames: self.stale_frames(),
            bytes_received: self.bytes_received(),
        }
    }
}

impl Default for SubscriptionHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthSummary {
    pub frames_received: u64,
    pub frames_published: u64,
    pub malformed_frames: u64,
    pub stale_frames: u64,
    pub bytes_received: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames received, {} published, {} malformed, {} stale, {} bytes",
            self.frames_received,
            self.frames_published,
            self.malformed_frames,
            self.stale_frames,
            self.bytes_received
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_metrics() {
        let health = SubscriptionHealth::new();

        health.record_received(1000);
        health.record_received(1500);
        assert_eq!(health.record_published(), 1);
        health.record_stale();
        assert_eq!(health.record_malformed(), 1);

        let summary = health.summary();
        assert_eq!(summary.frames_received, 2);
        assert_eq!(summary.frames_published, 1);
        assert_eq!(summary.stale_frames, 1);
        assert_eq!(summary.malformed_frames, 1);
        assert_eq!(summary.bytes_received, 2500);
        assert_eq!(
            summary.to_string(),
            "2 frames received, 1 published, 1 malformed, 1 stale, 2500 bytes"
        );
    }

    #[test]
    fn test_stall_detection() {
        let health = SubscriptionHealth::new();

        // Should not be stalled immediately
        assert!(!health.is_stalled(Duration::from_secs(1)));

        health.record_published();

        // Simulate stall by not publishing frames
        std::thread::sleep(Duration::from_millis(150));

        assert!(health.is_stalled(Duration::from_millis(100)));
    }
}
