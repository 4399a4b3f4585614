//! Filesystem facts feeding the scorer
//!
//! The scorer itself is pure; everything it needs to know about the
//! project tree arrives through [`FilesystemProbe`].

use crate::config::{LayoutConfig, NeuralConfig, ScoringConfig, TestsConfig};
use crate::models::{FileBucket, FileCounts};
use crate::store::read_json;
use chrono::{DateTime, Utc};
use ignore::{DirEntry, WalkBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Presence and size facts about the project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeFacts {
    /// Size of README.md, if present
    pub readme_bytes: Option<u64>,
    pub has_license: bool,
    pub has_instructions: bool,
    /// At least one machine-readable API spec (openapi*.json/yaml/yml)
    pub has_api_spec: bool,
    pub has_setup_guide: bool,
    pub config_files_present: usize,
    pub config_files_expected: usize,
    pub api_configured: bool,
    pub mcp_providers: u32,
    /// Markdown files in the project root
    pub markdown_files: u32,
}

/// Source of project facts and file counts
pub trait FilesystemProbe: Send {
    fn facts(&self) -> ProbeFacts;
    fn file_counts(&self) -> FileCounts;
}

/// Probe over a real project tree
#[derive(Debug, Clone)]
pub struct ProjectProbe {
    root: PathBuf,
    scoring: ScoringConfig,
    layout: LayoutConfig,
    tests: TestsConfig,
    skip_dirs: Vec<String>,
}

impl ProjectProbe {
    pub fn new(root: &Path, config: &NeuralConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            scoring: config.scoring.clone(),
            layout: config.layout.clone(),
            tests: config.tests.clone(),
            skip_dirs: config.watch.ignore_dirs.clone(),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    /// Files under `dir`, skipping ignored directories and honouring .gitignore
    fn walk_files(&self, dir: &Path) -> impl Iterator<Item = DirEntry> {
        let skip = self.skip_dirs.clone();
        WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| skip.iter().any(|s| s == name)))
            })
            .build()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
    }

    fn has_api_spec(&self) -> bool {
        self.walk_files(&self.root).any(|entry| {
            let path = entry.path();
            let stem_ok = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("openapi"));
            let ext_ok = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json" | "yaml" | "yml")
            );
            stem_ok && ext_ok
        })
    }

    fn api_configured(&self) -> bool {
        let vars = &self.scoring.api_env_vars;
        if vars
            .iter()
            .any(|v| std::env::var(v).is_ok_and(|val| !val.trim().is_empty()))
        {
            return true;
        }
        match fs::read_to_string(self.root.join(".env")) {
            Ok(env) => vars.iter().any(|v| env.contains(v.as_str())),
            Err(_) => false,
        }
    }

    /// Union of `mcpServers` keys across the configured files
    fn mcp_providers(&self) -> u32 {
        let mut providers = BTreeSet::new();
        for file in &self.scoring.mcp_config_files {
            let path = self.root.join(file);
            if !path.is_file() {
                continue;
            }
            let Some(doc) = read_json::<serde_json::Value>(&path) else {
                continue;
            };
            if let Some(servers) = doc.get("mcpServers").and_then(|v| v.as_object()) {
                providers.extend(servers.keys().cloned());
            }
        }
        providers.len() as u32
    }

    fn root_markdown_files(&self) -> u32 {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("md"))
            .count() as u32
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from)
}

fn extension_in(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x == ext))
}

impl FilesystemProbe for ProjectProbe {
    fn facts(&self) -> ProbeFacts {
        let readme_bytes = fs::metadata(self.root.join("README.md"))
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len());
        let config_files_present = self
            .scoring
            .config_checklist
            .iter()
            .filter(|f| self.exists(f))
            .count();

        let facts = ProbeFacts {
            readme_bytes,
            has_license: self.exists("LICENSE") || self.exists("LICENSE.md"),
            has_instructions: self.exists(&self.scoring.instructions_file),
            has_api_spec: self.has_api_spec(),
            has_setup_guide: self.scoring.setup_guides.iter().any(|f| self.exists(f)),
            config_files_present,
            config_files_expected: self.scoring.config_checklist.len(),
            api_configured: self.api_configured(),
            mcp_providers: self.mcp_providers(),
            markdown_files: self.root_markdown_files(),
        };
        debug!("Probe facts for {}: {:?}", self.root.display(), facts);
        facts
    }

    fn file_counts(&self) -> FileCounts {
        let layout = &self.layout;
        let mut counts = FileCounts::default();

        // Frontend: recursive, excluding the schemas dir
        let frontend_root = self.root.join(&layout.frontend_dir);
        if frontend_root.is_dir() {
            for entry in self.walk_files(&frontend_root) {
                let path = entry.path();
                if !extension_in(path, &layout.frontend_extensions) {
                    continue;
                }
                let relative = path.strip_prefix(&frontend_root).unwrap_or(path);
                let in_schemas = relative.components().any(|c| {
                    matches!(c, Component::Normal(n) if n.to_str() == Some(layout.schemas_dir.as_str()))
                });
                if !in_schemas {
                    counts.frontend.record(modified_at(path));
                }
            }
        }

        // Backend: recursive, no dunder files or the models file
        let backend_root = self.root.join(&layout.backend_dir);
        if backend_root.is_dir() {
            for entry in self.walk_files(&backend_root) {
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(layout.backend_extension.as_str());
                if ext_ok && !name.starts_with("__") && name != layout.models_file {
                    counts.backend.record(modified_at(path));
                }
            }
        }

        // Tests: recursive test_*.py style files
        let tests_root = self.root.join(&self.tests.directory);
        if tests_root.is_dir() {
            for entry in self.walk_files(&tests_root) {
                let path = entry.path();
                let name_ok = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&self.tests.file_prefix));
                let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(self.tests.extension.as_str());
                if name_ok && ext_ok {
                    counts.tests.record(modified_at(path));
                }
            }
        }

        // Data: models file, schema files, root data files
        let mut data = FileBucket::default();
        let models = backend_root.join(&layout.models_file);
        if models.is_file() {
            data.record(modified_at(&models));
        }
        let schemas_root = frontend_root.join(&layout.schemas_dir);
        if schemas_root.is_dir() {
            for entry in self.walk_files(&schemas_root) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(layout.schema_extension.as_str()) {
                    data.record(modified_at(path));
                }
            }
        }
        for name in &layout.data_files {
            let path = self.root.join(name);
            if path.is_file() {
                data.record(modified_at(&path));
            }
        }
        counts.data = data;

        debug!(
            "File counts: frontend={}, backend={}, tests={}, data={}",
            counts.frontend.files, counts.backend.files, counts.tests.files, counts.data.files
        );
        counts
    }
}
