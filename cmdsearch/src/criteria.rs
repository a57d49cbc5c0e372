use serde::{Deserialize, Serialize};

use crate::content::ContentMatcher;
use crate::errors::{SearchError, SearchResult};
use crate::filter::{Filter, PatternSyntax};
use crate::stats::SearchStats;

/// Depth value meaning "no limit"
pub const UNLIMITED_DEPTH: i32 = -1;

/// What to look for. Fixed for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// File name pattern; empty matches every name
    #[serde(default)]
    pub name_pattern: String,

    #[serde(default)]
    pub syntax: PatternSyntax,

    /// Applies to both the name and the content pattern
    #[serde(default)]
    pub match_case: bool,

    /// Regular expression searched for in file content
    #[serde(default)]
    pub content_pattern: Option<String>,

    /// -1 for unlimited, 0 for the start directory only
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
}

fn default_max_depth() -> i32 {
    UNLIMITED_DEPTH
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            name_pattern: String::new(),
            syntax: PatternSyntax::default(),
            match_case: false,
            content_pattern: None,
            max_depth: UNLIMITED_DEPTH,
        }
    }
}

impl SearchCriteria {
    pub fn new(name_pattern: impl Into<String>) -> Self {
        Self {
            name_pattern: name_pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_syntax(mut self, syntax: PatternSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_content(mut self, pattern: impl Into<String>) -> Self {
        self.content_pattern = Some(pattern.into());
        self
    }

    pub fn with_match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    pub fn with_max_depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Content pattern, if content search is actually requested
    pub fn content_search(&self) -> Option<&str> {
        self.content_pattern.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_depth == UNLIMITED_DEPTH
    }

    /// Compiles both patterns. Nothing is searched if this fails.
    pub fn compile(&self, stats: &SearchStats) -> SearchResult<CompiledCriteria> {
        if self.max_depth < UNLIMITED_DEPTH {
            return Err(SearchError::config_error(format!(
                "max_depth must be -1 or greater, got {}",
                self.max_depth
            )));
        }

        let name_filter = if self.name_pattern.is_empty() {
            None
        } else {
            Some(Filter::new(&self.name_pattern, self.match_case, self.syntax)?)
        };

        let content = self
            .content_search()
            .map(|pattern| ContentMatcher::with_stats(pattern, self.match_case, stats.clone()))
            .transpose()?;

        Ok(CompiledCriteria {
            name_filter,
            content,
            max_depth: self.max_depth,
        })
    }
}

/// Criteria with patterns compiled, owned by the worker
#[derive(Debug, Clone)]
pub struct CompiledCriteria {
    pub name_filter: Option<Filter>,
    pub content: Option<ContentMatcher>,
    pub max_depth: i32,
}

impl CompiledCriteria {
    pub fn name_matches(&self, name: &str) -> bool {
        self.name_filter.as_ref().map_or(true, |f| f.matches(name))
    }

    /// Depth limit in `ignore` terms, where children of the root are depth 1
    pub fn walk_depth(&self) -> Option<usize> {
        usize::try_from(self.max_depth).ok().map(|d| d + 1)
    }
}
