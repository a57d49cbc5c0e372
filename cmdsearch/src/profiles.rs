use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::criteria::SearchCriteria;
use crate::errors::{SearchError, SearchResult};

const PROFILES_FILE: &str = "profiles.json";

/// A named, reusable set of search criteria
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchProfile {
    pub name: String,
    #[serde(default)]
    pub criteria: SearchCriteria,
}

impl SearchProfile {
    pub fn new(name: impl Into<String>, criteria: SearchCriteria) -> Self {
        Self {
            name: name.into(),
            criteria,
        }
    }

    /// Back to an unnamed profile with default criteria
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn copy_from(&mut self, other: &Self) {
        self.name.clone_from(&other.name);
        self.criteria.clone_from(&other.criteria);
    }

    pub fn to_json(&self) -> SearchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One-line summary shown next to the name
    pub fn description(&self) -> String {
        match self.criteria.content_search() {
            Some(text) => format!("{} / {}", self.criteria.name_pattern, text),
            None => self.criteria.name_pattern.clone(),
        }
    }
}

/// Ordered collection of profiles, persisted as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStore {
    #[serde(default)]
    pub profiles: Vec<SearchProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/cmdsearch/profiles.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cmdsearch").join(PROFILES_FILE))
    }

    /// Loads the store; a missing file is an empty store
    pub fn load(path: &Path) -> SearchResult<Self> {
        if !path.exists() {
            debug!("No profile store at {}", path.display());
            return Ok(Self::new());
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

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SearchProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Adds a profile, replacing one with the same name in place
    pub fn add(&mut self, profile: SearchProfile) {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<SearchProfile> {
        let index = self.profiles.iter().position(|p| p.name == name)?;
        Some(self.profiles.remove(index))
    }

    /// Appends a copy of the profile at `index` and returns the new index
    pub fn duplicate(&mut self, index: usize) -> Option<usize> {
        let mut copy = self.profiles.get(index)?.clone();
        copy.name = format!("{} (copy)", copy.name);
        self.profiles.push(copy);
        Some(self.profiles.len() - 1)
    }

    /// Keeps only the profiles at `indexes`, in that order
    pub fn pick(&mut self, indexes: &[usize]) {
        self.profiles = indexes
            .iter()
            .filter_map(|&i| self.profiles.get(i).cloned())
            .collect();
    }
}
