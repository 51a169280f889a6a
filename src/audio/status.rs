use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Faults seen by the audio callback, which cannot return errors to the
/// backend. The render loop drains them once per frame.
#[derive(Debug, Default)]
pub struct CaptureStatus {
    skipped: AtomicU64,
    dropped: AtomicU64,
    stream_errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Faults observed since the previous [`CaptureStatus::take_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Callback invocations that delivered no frames.
    pub skipped: u64,
    /// Bursts discarded because the consumer held the ring lock.
    pub dropped: u64,
    pub stream_errors: u64,
    pub last_error: Option<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.dropped == 0 && self.stream_errors == 0
    }
}

impl CaptureStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Called from cpal's error callback, which is not the realtime data path.
    pub fn record_stream_error(&self, message: impl Into<String>) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(message.into());
    }

    pub fn take_report(&self) -> StatusReport {
        StatusReport {
            skipped: self.skipped.swap(0, Ordering::Relaxed),
            dropped: self.dropped.swap(0, Ordering::Relaxed),
            stream_errors: self.stream_errors.swap(0, Ordering::Relaxed),
            last_error: self.last_error.lock().take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_drains_counters() {
        let status = CaptureStatus::new();
        status.record_skipped();
        status.record_skipped();
        status.record_dropped();
        status.record_stream_error("device unplugged");

        let report = status.take_report();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.stream_errors, 1);
        assert_eq!(report.last_error.as_deref(), Some("device unplugged"));
        assert!(!report.is_clean());

        assert!(status.take_report().is_clean());
    }
}
