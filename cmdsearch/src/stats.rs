use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Running counters for one search run.
///
/// Cheap to clone; all clones share the same counters, so the walker and
/// the content matcher can both write to them from the worker thread
/// while the front end reads a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    dirs_visited: Arc<AtomicU64>,
    files_examined: Arc<AtomicU64>,
    files_matched: Arc<AtomicU64>,
    content_scans: Arc<AtomicU64>,
    bytes_scanned: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dir(&self) {
        self.dirs_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file(&self) {
        self.files_examined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_content_scan(&self) {
        self.content_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dirs_visited: self.dirs_visited.load(Ordering::Relaxed),
            files_examined: self.files_examined.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            content_scans: self.content_scans.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Walk stats:\n\
             Directories visited: {}\n\
             Files examined/matched: {}/{}\n\
             Content scans: {} ({} bytes)\n\
             Errors: {}",
            stats.dirs_visited,
            stats.files_examined,
            stats.files_matched,
            stats.content_scans,
            stats.bytes_scanned,
            stats.errors
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dirs_visited: u64,
    pub files_examined: u64,
    pub files_matched: u64,
    pub content_scans: u64,
    pub bytes_scanned: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = SearchStats::new();
        stats.record_dir();
        stats.record_file();
        stats.record_file();
        stats.record_match();
        stats.record_content_scan();
        stats.record_bytes(1000);
        stats.record_bytes(24);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.dirs_visited, 1);
        assert_eq!(snap.files_examined, 2);
        assert_eq!(snap.files_matched, 1);
        assert_eq!(snap.content_scans, 1);
        assert_eq!(snap.bytes_scanned, 1024);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let stats = SearchStats::new();
        let clone = stats.clone();
        clone.record_match();
        clone.record_match();
        assert_eq!(stats.snapshot().files_matched, 2);
    }
}
