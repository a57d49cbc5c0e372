use regex::bytes::{Regex, RegexBuilder};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::errors::{SearchError, SearchResult};
use crate::stats::SearchStats;

/// Bytes carried over from the previous window
pub const OVERLAP_SIZE: usize = 4096;
/// Bytes read from the source per step
pub const BUFFER_SIZE: usize = OVERLAP_SIZE * 10;

/// Scans file content for a regular expression.
///
/// The file is read `BUFFER_SIZE` bytes at a time. Each window starts with
/// the last `OVERLAP_SIZE` bytes of the previous one, so a match that
/// crosses a read boundary is still seen as long as it is no longer than
/// the overlap. Longer matches sitting on a boundary can be missed.
#[derive(Debug, Clone)]
pub struct ContentMatcher {
    regex: Regex,
    stats: SearchStats,
}

impl ContentMatcher {
    pub fn new(pattern: &str, match_case: bool) -> SearchResult<Self> {
        Self::with_stats(pattern, match_case, SearchStats::new())
    }

    /// Creates a matcher that reports scanned bytes into `stats`
    pub fn with_stats(pattern: &str, match_case: bool, stats: SearchStats) -> SearchResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!match_case)
            .build()
            .map_err(|e| SearchError::invalid_pattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex, stats })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns true as soon as the pattern is found in `reader`.
    ///
    /// `stop` is checked before every read; a raised flag ends the scan
    /// with `false`.
    pub fn matches_reader<R: Read>(&self, mut reader: R, stop: &AtomicBool) -> io::Result<bool> {
        self.stats.record_content_scan();

        let mut window = vec![0u8; OVERLAP_SIZE + BUFFER_SIZE];
        let mut carried = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(false);
            }

            let read = match reader.read(&mut window[carried..carried + BUFFER_SIZE]) {
                Ok(0) => return Ok(false),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.stats.record_bytes(read as u64);

            let len = carried + read;
            if self.regex.is_match(&window[..len]) {
                return Ok(true);
            }

            if len < OVERLAP_SIZE {
                carried = len;
            } else {
                window.copy_within(len - OVERLAP_SIZE..len, 0);
                carried = OVERLAP_SIZE;
            }
        }
    }

    /// Opens `path` and scans it
    pub fn matches_file(&self, path: &Path, stop: &AtomicBool) -> SearchResult<bool> {
        trace!("Scanning content of {}", path.display());
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        self.matches_reader(file, stop)
            .map_err(|e| SearchError::from_io(path, e))
    }
}
