use ignore::{DirEntry, WalkBuilder};
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

use crate::criteria::{CompiledCriteria, SearchCriteria};
use crate::errors::{SearchError, SearchResult};
use crate::results::{FoundFile, SearchOutput};
use crate::stats::SearchStats;

/// What the walker reports while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMessage {
    /// Human readable progress text, e.g. the directory being searched
    Status(String),
    /// A file that satisfied the criteria
    Found(FoundFile),
}

/// How a walk ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutcome {
    pub matches: usize,
    /// Directories holding at least one match, first-seen order
    pub match_dirs: Vec<PathBuf>,
    /// Set when the stop flag cut the walk short
    pub stopped: bool,
}

/// Depth-limited recursive search over a directory tree
#[derive(Debug, Clone)]
pub struct Walker {
    criteria: CompiledCriteria,
    stats: SearchStats,
}

impl Walker {
    pub fn new(criteria: CompiledCriteria, stats: SearchStats) -> Self {
        Self { criteria, stats }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Walks `root` depth first, reporting through `on_message`.
    ///
    /// Symlinks are never descended, so links back to an ancestor cannot
    /// loop. A symlink to a regular file is treated like the file itself.
    /// `stop` is checked before every entry.
    pub fn walk(
        &self,
        root: &Path,
        stop: &AtomicBool,
        on_message: &mut dyn FnMut(SearchMessage),
    ) -> SearchResult<WalkOutcome> {
        let root_meta = fs::metadata(root).map_err(|e| SearchError::from_io(root, e))?;
        if !root_meta.is_dir() {
            return Err(SearchError::config_error(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        info!(
            "Starting walk of {} (max depth {})",
            root.display(),
            self.criteria.max_depth
        );

        let walk_depth = self.criteria.walk_depth();
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .max_depth(walk_depth);

        let mut outcome = WalkOutcome::default();
        let mut seen_dirs = HashSet::new();

        for entry in builder.build() {
            if stop.load(Ordering::Relaxed) {
                debug!("Stop requested, abandoning walk");
                outcome.stopped = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    self.stats.record_error();
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                // Directories at the depth limit are listed but never entered
                if walk_depth.is_some_and(|limit| entry.depth() >= limit) {
                    continue;
                }
                self.stats.record_dir();
                debug!("Entering {}", entry.path().display());
                on_message(SearchMessage::Status(format!(
                    "Searching in: {}",
                    entry.path().display()
                )));
                continue;
            }

            let Some(metadata) = self.regular_file_metadata(&entry) else {
                continue;
            };
            self.stats.record_file();

            if !self.file_matches(&entry, stop) {
                continue;
            }

            if let Some(parent) = entry.path().parent() {
                if seen_dirs.insert(parent.to_path_buf()) {
                    outcome.match_dirs.push(parent.to_path_buf());
                }
            }

            self.stats.record_match();
            outcome.matches += 1;
            on_message(SearchMessage::Found(FoundFile::new(
                entry.into_path(),
                &metadata,
            )));
        }

        info!(
            "Walk of {} {}: {} matches",
            root.display(),
            if outcome.stopped { "stopped" } else { "complete" },
            outcome.matches
        );
        self.stats.log_stats();

        Ok(outcome)
    }

    /// Metadata for entries that count as regular files, `None` for the rest
    fn regular_file_metadata(&self, entry: &DirEntry) -> Option<Metadata> {
        if entry.path_is_symlink() {
            // Resolve the target; directories behind links are never entered
            return match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => Some(meta),
                Ok(_) => None,
                Err(e) => {
                    debug!("Dangling symlink {}: {}", entry.path().display(), e);
                    None
                }
            };
        }

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            return None;
        }

        match entry.metadata() {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", entry.path().display(), e);
                self.stats.record_error();
                None
            }
        }
    }

    fn file_matches(&self, entry: &DirEntry, stop: &AtomicBool) -> bool {
        let name = entry.file_name().to_string_lossy();
        if !self.criteria.name_matches(&name) {
            return false;
        }

        let Some(content) = &self.criteria.content else {
            return true;
        };

        trace!("Content check for {}", entry.path().display());
        match content.matches_file(entry.path(), stop) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Content matching for '{}' failed: {}",
                    entry.path().display(),
                    e
                );
                self.stats.record_error();
                false
            }
        }
    }
}

/// Runs a whole search on the calling thread and collects the result
pub fn search(root: &Path, criteria: &SearchCriteria) -> SearchResult<SearchOutput> {
    let stats = SearchStats::new();
    let walker = Walker::new(criteria.compile(&stats)?, stats);
    let never = AtomicBool::new(false);

    let mut output = SearchOutput::new();
    let outcome = walker.walk(root, &never, &mut |message| {
        if let SearchMessage::Found(file) = message {
            output.add_file(file);
        }
    })?;
    output.stopped = outcome.stopped;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PatternSyntax;
    use std::fs;
    use tempfile::tempdir;

    fn names(output: &SearchOutput, root: &Path) -> Vec<String> {
        let mut names: Vec<String> = output
            .relative_paths(root)
            .into_iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_name_only_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "").unwrap();

        let out = search(dir.path(), &SearchCriteria::new("*.txt")).unwrap();
        assert_eq!(names(&out, dir.path()), vec!["a.txt", "sub/c.txt"]);
        assert!(!out.stopped);
    }

    #[test]
    fn test_directories_are_never_results() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("docs.txt")).unwrap();
        fs::write(dir.path().join("docs.txt/inner.txt"), "").unwrap();

        let out = search(dir.path(), &SearchCriteria::new("*.txt")).unwrap();
        assert_eq!(names(&out, dir.path()), vec!["docs.txt/inner.txt"]);
    }

    #[test]
    fn test_hidden_files_are_searched() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".hidden.txt"), "").unwrap();
        fs::write(dir.path().join(".gitignore"), "*.txt\n").unwrap();
        fs::write(dir.path().join("shown.txt"), "").unwrap();

        let out = search(dir.path(), &SearchCriteria::new("*.txt")).unwrap();
        assert_eq!(names(&out, dir.path()), vec![".hidden.txt", "shown.txt"]);
    }

    #[test]
    fn test_depth_limit() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("l1/l2/l3")).unwrap();
        fs::write(dir.path().join("f0.txt"), "").unwrap();
        fs::write(dir.path().join("l1/f1.txt"), "").unwrap();
        fs::write(dir.path().join("l1/l2/f2.txt"), "").unwrap();
        fs::write(dir.path().join("l1/l2/l3/f3.txt"), "").unwrap();

        let at = |depth| {
            let out = search(dir.path(), &SearchCriteria::new("*.txt").with_max_depth(depth))
                .unwrap();
            out.len()
        };
        assert_eq!(at(0), 1);
        assert_eq!(at(1), 2);
        assert_eq!(at(2), 3);
        assert_eq!(at(-1), 4);
    }

    #[test]
    fn test_regex_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("IMG_001.jpg"), "").unwrap();
        fs::write(dir.path().join("img_002.JPEG"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let criteria = SearchCriteria::new(r"\.jpe?g$").with_syntax(PatternSyntax::Regex);
        let out = search(dir.path(), &criteria).unwrap();
        assert_eq!(names(&out, dir.path()), vec!["IMG_001.jpg", "img_002.JPEG"]);

        let out = search(dir.path(), &criteria.with_match_case(true)).unwrap();
        assert_eq!(names(&out, dir.path()), vec!["IMG_001.jpg"]);
    }

    #[test]
    fn test_content_filter_and_match_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        fs::create_dir(dir.path().join("y")).unwrap();
        fs::write(dir.path().join("x/1.log"), "error: disk full").unwrap();
        fs::write(dir.path().join("x/2.log"), "all fine").unwrap();
        fs::write(dir.path().join("x/3.log"), "ERROR again").unwrap();
        fs::write(dir.path().join("y/4.log"), "nothing").unwrap();

        let out = search(dir.path(), &SearchCriteria::new("*.log").with_content("error")).unwrap();
        assert_eq!(names(&out, dir.path()), vec!["x/1.log", "x/3.log"]);
        assert_eq!(out.match_dirs, vec![dir.path().join("x")]);
    }

    #[test]
    fn test_empty_files_never_match_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();
        let out = search(dir.path(), &SearchCriteria::new("*").with_content(".*")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_status_messages() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let stats = SearchStats::new();
        let walker = Walker::new(SearchCriteria::default().compile(&stats).unwrap(), stats);
        let mut statuses = Vec::new();
        walker
            .walk(dir.path(), &AtomicBool::new(false), &mut |m| {
                if let SearchMessage::Status(s) = m {
                    statuses.push(s);
                }
            })
            .unwrap();

        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].starts_with("Searching in: "));
        assert!(statuses.iter().any(|s| s.ends_with("sub")));
        assert_eq!(walker.stats().snapshot().dirs_visited, 2);
    }

    #[test]
    fn test_no_status_for_directories_past_depth_limit() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/deeper/f.txt"), "x").unwrap();

        let stats = SearchStats::new();
        let criteria = SearchCriteria::default().with_max_depth(0);
        let walker = Walker::new(criteria.compile(&stats).unwrap(), stats);
        let mut statuses = Vec::new();
        walker
            .walk(dir.path(), &AtomicBool::new(false), &mut |m| {
                if let SearchMessage::Status(s) = m {
                    statuses.push(s);
                }
            })
            .unwrap();

        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].ends_with("sub"));
        assert_eq!(walker.stats().snapshot().dirs_visited, 1);
    }

    #[test]
    fn test_stop_before_walk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();

        let stats = SearchStats::new();
        let walker = Walker::new(SearchCriteria::default().compile(&stats).unwrap(), stats);
        let mut found = 0;
        let outcome = walker
            .walk(dir.path(), &AtomicBool::new(true), &mut |m| {
                if matches!(m, SearchMessage::Found(_)) {
                    found += 1;
                }
            })
            .unwrap();

        assert!(outcome.stopped);
        assert_eq!(found, 0);
    }

    #[test]
    fn test_stop_during_walk() {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            fs::write(dir.path().join(format!("f{}.txt", i)), "").unwrap();
        }

        let stats = SearchStats::new();
        let walker = Walker::new(SearchCriteria::default().compile(&stats).unwrap(), stats);
        let stop = AtomicBool::new(false);
        let mut found = 0;
        let outcome = walker
            .walk(dir.path(), &stop, &mut |m| {
                if matches!(m, SearchMessage::Found(_)) {
                    found += 1;
                    if found == 5 {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            })
            .unwrap();

        assert!(outcome.stopped);
        assert_eq!(found, 5);
        assert_eq!(outcome.matches, 5);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let err = search(&dir.path().join("nope"), &SearchCriteria::default()).unwrap_err();
        assert!(matches!(err, SearchError::FileNotFound(_)));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "").unwrap();
        let err = search(&file, &SearchCriteria::default()).unwrap_err();
        assert!(matches!(err, SearchError::ConfigError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/target.txt"), "").unwrap();
        symlink(dir.path().join("real"), dir.path().join("dirlink")).unwrap();
        symlink(dir.path().join("real/target.txt"), dir.path().join("filelink.txt")).unwrap();
        symlink(dir.path().join("gone.txt"), dir.path().join("dangling.txt")).unwrap();

        let out = search(dir.path(), &SearchCriteria::new("*.txt")).unwrap();
        assert_eq!(
            names(&out, dir.path()),
            vec!["filelink.txt", "real/target.txt"]
        );
    }
}
