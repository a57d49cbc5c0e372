use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A regular file that satisfied the search criteria
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundFile {
    /// Full path as produced by the traversal
    pub path: PathBuf,
    /// File name as displayed (lossy UTF-8)
    pub name: String,
    /// Size in bytes at match time
    pub size: u64,
    /// Last modification time, when the platform provides it
    pub modified: Option<SystemTime>,
}

impl FoundFile {
    pub fn new(path: PathBuf, metadata: &Metadata) -> Self {
        let name = display_name(&path);
        Self {
            name,
            size: metadata.len(),
            modified: metadata.modified().ok(),
            path,
        }
    }

    /// Directory the file was found in
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Lossy display name of the last path component
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// The complete outcome of one search run
#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    /// Matches in the order they were found
    pub files: Vec<FoundFile>,
    /// Directories holding at least one match, first-seen order, no duplicates
    pub match_dirs: Vec<PathBuf>,
    /// Whether the run was stopped before the tree was fully walked
    pub stopped: bool,
    seen_dirs: HashSet<PathBuf>,
}

impl SearchOutput {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a match and remembers its directory
    pub fn add_file(&mut self, file: FoundFile) {
        if let Some(parent) = file.parent() {
            self.add_match_dir(parent);
        }
        self.files.push(file);
    }

    pub fn add_match_dir(&mut self, dir: &Path) {
        if self.seen_dirs.insert(dir.to_path_buf()) {
            self.match_dirs.push(dir.to_path_buf());
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths relative to `root`, for display and comparisons
    pub fn relative_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| f.path.clone())
            })
            .collect()
    }
}

/// Final report of a run, as shown once polling stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub matches: usize,
    pub aborted: bool,
}

impl SearchSummary {
    pub fn message(&self) -> String {
        let noun = if self.matches == 1 { "match" } else { "matches" };
        if self.aborted {
            format!("Found {} {} - search aborted", self.matches, noun)
        } else {
            format!("Found {} {}", self.matches, noun)
        }
    }
}
