use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::SearchBackend;
use crate::criteria::{SearchCriteria, UNLIMITED_DEPTH};
use crate::errors::SearchResult;
use crate::filter::PatternSyntax;
use crate::history::DEFAULT_HISTORY_SIZE;

/// Settings for a search front end.
///
/// Loaded from YAML, in increasing order of precedence:
/// 1. `$HOME/.config/cmdsearch/config.yaml`
/// 2. `.cmdsearch.yaml` in the current directory
/// 3. a file given with `--config`
///
/// ```yaml
/// root_path: "~/Documents"
/// name_pattern: "*.txt"
/// syntax: glob
/// content_pattern: "invoice"
/// max_depth: 3
/// backend: internal
/// log_level: "info"
/// ```
///
/// Command-line values win over anything read from a file, see
/// [`CmdSearchConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmdSearchConfig {
    /// Directory the search starts in
    pub root_path: PathBuf,
    pub name_pattern: String,
    pub syntax: PatternSyntax,
    pub match_case: bool,
    pub content_pattern: Option<String>,
    /// -1 for unlimited
    pub max_depth: i32,
    pub backend: SearchBackend,
    /// How often a front end drains the worker's mailbox
    pub poll_interval_ms: u64,
    pub history_size: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "warn".to_string()
}

const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

impl Default for CmdSearchConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            name_pattern: String::new(),
            syntax: PatternSyntax::default(),
            match_case: false,
            content_pattern: None,
            max_depth: UNLIMITED_DEPTH,
            backend: SearchBackend::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_size: DEFAULT_HISTORY_SIZE,
            log_level: default_log_level(),
        }
    }
}

impl CmdSearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, adding `config_path` on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("cmdsearch/config.yaml")),
            Some(PathBuf::from(".cmdsearch.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges command-line values over the loaded ones. A value still at
    /// its default on the command line leaves the file's value alone.
    pub fn merge_with_cli(mut self, cli: CmdSearchConfig) -> Self {
        let defaults = Self::default();

        if cli.root_path != defaults.root_path {
            self.root_path = cli.root_path;
        }
        if !cli.name_pattern.is_empty() {
            self.name_pattern = cli.name_pattern;
        }
        if cli.syntax != defaults.syntax {
            self.syntax = cli.syntax;
        }
        if cli.match_case {
            self.match_case = true;
        }
        if cli.content_pattern.is_some() {
            self.content_pattern = cli.content_pattern;
        }
        if cli.max_depth != defaults.max_depth {
            self.max_depth = cli.max_depth;
        }
        if cli.backend != defaults.backend {
            self.backend = cli.backend;
        }
        if cli.poll_interval_ms != defaults.poll_interval_ms {
            self.poll_interval_ms = cli.poll_interval_ms;
        }
        if cli.history_size != defaults.history_size {
            self.history_size = cli.history_size;
        }
        if cli.log_level != defaults.log_level {
            self.log_level = cli.log_level;
        }
        self
    }

    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            name_pattern: self.name_pattern.clone(),
            syntax: self.syntax,
            match_case: self.match_case,
            content_pattern: self.content_pattern.clone(),
            max_depth: self.max_depth,
        }
    }

    /// Copies a saved set of criteria into this config
    pub fn apply_criteria(&mut self, criteria: &SearchCriteria) {
        self.name_pattern.clone_from(&criteria.name_pattern);
        self.syntax = criteria.syntax;
        self.match_case = criteria.match_case;
        self.content_pattern.clone_from(&criteria.content_pattern);
        self.max_depth = criteria.max_depth;
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
