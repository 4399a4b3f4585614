//! Noise filtering and test-file classification for watched paths

use crate::config::{TestsConfig, WatchConfig};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// A single ignore entry: a directory/file name or an extension
#[derive(Debug, Clone, PartialEq, Eq)]
enum IgnorePattern {
    Name(String),
    Extension(String),
}

impl IgnorePattern {
    /// `*.ext` selects an extension, anything else a path segment name
    fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }
        match pattern.strip_prefix("*.") {
            Some(ext) if !ext.is_empty() => Some(Self::Extension(ext.to_string())),
            Some(_) => None,
            None => Some(Self::Name(pattern.trim_end_matches('/').to_string())),
        }
    }
}

/// Runtime-mutable ignore sets
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    names: BTreeSet<String>,
    extensions: BTreeSet<String>,
}

impl IgnoreRules {
    pub fn new<N, E>(names: N, extensions: E) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            extensions: extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.ignore_dirs.iter().cloned(), config.ignore_extensions.iter().cloned())
    }

    /// True if any segment of `relative` is an ignored name or its extension is ignored
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let segment_hit = relative.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.names.contains(n)),
            _ => false,
        });
        if segment_hit {
            return true;
        }
        relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }

    /// Add a pattern; returns false if it was already present or invalid
    pub fn add_pattern(&mut self, pattern: &str) -> bool {
        match IgnorePattern::parse(pattern) {
            Some(IgnorePattern::Name(name)) => self.names.insert(name),
            Some(IgnorePattern::Extension(ext)) => self.extensions.insert(ext),
            None => false,
        }
    }

    /// Remove a pattern; returns false if it was not present
    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        match IgnorePattern::parse(pattern) {
            Some(IgnorePattern::Name(name)) => self.names.remove(&name),
            Some(IgnorePattern::Extension(ext)) => self.extensions.remove(&ext),
            None => false,
        }
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }
}

/// Decides whether a path is a test source
#[derive(Debug, Clone)]
pub struct TestFileClassifier {
    tests_dir: String,
    prefix: String,
    extension: String,
}

impl TestFileClassifier {
    pub fn new(tests_dir: impl Into<String>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            prefix: prefix.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &TestsConfig) -> Self {
        Self::new(&config.directory, &config.file_prefix, &config.extension)
    }

    /// Prefix + extension match on the file name, and some ancestor is the tests dir
    pub fn is_test_file(&self, relative: &Path) -> bool {
        let name_ok = relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.prefix));
        let ext_ok = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension);
        if !name_ok || !ext_ok {
            return false;
        }
        relative.parent().is_some_and(|parent| {
            parent
                .components()
                .any(|c| matches!(c, Component::Normal(n) if n.to_str() == Some(self.tests_dir.as_str())))
        })
    }
}
