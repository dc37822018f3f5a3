use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one transfer's progress.
///
/// `fraction` is always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub fraction: f64,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Builds a snapshot, deriving the clamped fraction from the byte counters.
    ///
    /// An unknown total (`0`) reports a fraction of `0.0`.
    pub fn new(transferred_bytes: u64, total_bytes: u64) -> Self {
        let fraction = if total_bytes == 0 {
            0.0
        } else {
            (transferred_bytes as f64 / total_bytes as f64).clamp(0.0, 1.0)
        };
        Self {
            fraction,
            transferred_bytes,
            total_bytes,
        }
    }

    /// The "nothing moved yet" snapshot emitted before data starts flowing.
    pub fn preparing() -> Self {
        Self::new(0, 0)
    }

    /// True while no bytes have been transferred and no fraction is known.
    pub fn is_preparing(&self) -> bool {
        self.fraction == 0.0 && self.transferred_bytes == 0
    }

    /// Progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Callback invoked with transfer progress. Purely observational.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Returns a callback that discards every update.
pub fn silent_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Accumulates transferred bytes for one transfer and reports each step.
///
/// Shared between the stream that moves bytes and whoever needs the final
/// count, hence the atomic.
pub struct ProgressCounter {
    transferred: AtomicU64,
    total: u64,
    callback: ProgressCallback,
}

impl ProgressCounter {
    /// Creates a counter for a transfer of `total` bytes (`0` if unknown).
    pub fn new(total: u64, callback: ProgressCallback) -> Self {
        Self {
            transferred: AtomicU64::new(0),
            total,
            callback,
        }
    }

    /// Records `bytes` more transferred and notifies the callback.
    pub fn advance(&self, bytes: u64) {
        let transferred = self.transferred.fetch_add(bytes, Ordering::Relaxed) + bytes;
        (self.callback)(TransferProgress::new(transferred, self.total));
    }

    /// Reports completion: a full bar even when the total was unknown.
    pub fn finish(&self) {
        let transferred = self.transferred();
        let total = if self.total == 0 {
            transferred
        } else {
            self.total
        };
        (self.callback)(TransferProgress {
            fraction: 1.0,
            transferred_bytes: transferred,
            total_bytes: total,
        });
    }

    /// Bytes recorded so far.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<TransferProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let cb: ProgressCallback = Arc::new(move |p| s.lock().unwrap().push(p));
        (cb, seen)
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(TransferProgress::new(50, 100).fraction, 0.5);
        assert_eq!(TransferProgress::new(150, 100).fraction, 1.0);
        assert_eq!(TransferProgress::new(10, 0).fraction, 0.0);
    }

    #[test]
    fn preparing_snapshot() {
        assert!(TransferProgress::preparing().is_preparing());
        assert!(!TransferProgress::new(1, 10).is_preparing());
        assert_eq!(TransferProgress::new(1, 4).percentage(), 25.0);
    }

    #[test]
    fn counter_reports_cumulative_bytes() {
        let (cb, seen) = recording();
        let counter = ProgressCounter::new(100, cb);
        counter.advance(40);
        counter.advance(60);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].transferred_bytes, 40);
        assert_eq!(seen[1].transferred_bytes, 100);
        assert_eq!(seen[1].fraction, 1.0);
        assert_eq!(counter.transferred(), 100);
    }

    #[test]
    fn finish_with_unknown_total_fills_bar() {
        let (cb, seen) = recording();
        let counter = ProgressCounter::new(0, cb);
        counter.advance(7);
        counter.finish();

        let last = *seen.lock().unwrap().last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.total_bytes, 7);
    }

    #[test]
    fn silent_progress_accepts_updates() {
        let cb = silent_progress();
        cb(TransferProgress::new(1, 2));
    }
}
