use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::criteria::SearchCriteria;
use crate::errors::{SearchError, SearchResult};

pub const DEFAULT_HISTORY_SIZE: usize = 16;

const HISTORY_FILE: &str = "history.json";

fn default_max_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

/// Most-recent-first list of previously used values, without duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    items: Vec<String>,
    #[serde(default = "default_max_size")]
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_max_size(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            items: Vec::new(),
            max_size,
        }
    }

    /// Moves `value` to the front. Empty values are ignored.
    pub fn add(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.items.retain(|item| item != value);
        self.items.insert(0, value.to_string());
        self.items.truncate(self.max_size);
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn set_items(&mut self, items: &[String]) {
        self.items = items.iter().take(self.max_size).cloned().collect();
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.items.truncate(max_size);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The histories a search front end offers in its input fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistory {
    #[serde(default)]
    pub name_patterns: History,
    #[serde(default)]
    pub content_patterns: History,
    #[serde(default)]
    pub directories: History,
}

impl SearchHistory {
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            name_patterns: History::with_max_size(max_size),
            content_patterns: History::with_max_size(max_size),
            directories: History::with_max_size(max_size),
        }
    }

    /// `<config dir>/cmdsearch/history.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cmdsearch").join(HISTORY_FILE))
    }

    /// Remembers what a search was started with
    pub fn record(&mut self, criteria: &SearchCriteria, root: &Path) {
        self.name_patterns.add(&criteria.name_pattern);
        if let Some(text) = criteria.content_search() {
            self.content_patterns.add(text);
        }
        self.directories.add(&root.to_string_lossy());
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.name_patterns.set_max_size(max_size);
        self.content_patterns.set_max_size(max_size);
        self.directories.set_max_size(max_size);
    }

    pub fn clear(&mut self) {
        self.name_patterns.clear();
        self.content_patterns.clear();
        self.directories.clear();
    }

    pub fn load(path: &Path) -> SearchResult<Self> {
        if !path.exists() {
            debug!("No search history at {}", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).map_err(|e| SearchError::from_io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> SearchResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| SearchError::from_io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_moves_to_front() {
        let mut h = History::default();
        h.add("a");
        h.add("b");
        h.add("c");
        h.add("a");
        assert_eq!(h.items(), ["a", "c", "b"]);
    }

    #[test]
    fn test_add_ignores_empty() {
        let mut h = History::default();
        h.add("");
        assert!(h.items().is_empty());
    }

    #[test]
    fn test_bounded() {
        let mut h = History::with_max_size(3);
        for v in ["1", "2", "3", "4", "5"] {
            h.add(v);
        }
        assert_eq!(h.items(), ["5", "4", "3"]);

        h.set_max_size(1);
        assert_eq!(h.items(), ["5"]);

        let mut h = History::with_max_size(2);
        h.set_items(&["x".to_string(), "y".to_string(), "z".to_string()]);
        assert_eq!(h.items(), ["x", "y"]);
    }

    #[test]
    fn test_record() {
        let mut history = SearchHistory::default();
        history.record(
            &SearchCriteria::new("*.txt").with_content("hello"),
            Path::new("/srv/data"),
        );
        history.record(&SearchCriteria::new("*.md"), Path::new("/srv/data"));

        assert_eq!(history.name_patterns.items(), ["*.md", "*.txt"]);
        assert_eq!(history.content_patterns.items(), ["hello"]);
        assert_eq!(history.directories.items(), ["/srv/data"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg").join(HISTORY_FILE);

        let mut history = SearchHistory::with_max_size(4);
        history.record(&SearchCriteria::new("*.rs"), dir.path());
        history.save(&path).unwrap();

        let loaded = SearchHistory::load(&path).unwrap();
        assert_eq!(loaded, history);

        let missing = SearchHistory::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(missing, SearchHistory::default());
    }
}
