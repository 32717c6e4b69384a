//! Suite file discovery and loading
//!
//! Suite files are named `testsuite_<type>_<name>.{yaml,yml,json}` and are
//! found by walking the configured search paths.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::compare::FilterSet;
use crate::error::EngineError;
use crate::models::TestSuite;

const SUITE_PREFIX: &str = "testsuite_";
const SUITE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Test type that selects every suite file
pub const ALL_TYPES: &str = "all";

/// Suite validation errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Search path does not exist: {0}")]
    MissingPath(PathBuf),

    #[error("Suite '{suite}' declares test '{case}' more than once")]
    DuplicateCase { suite: String, case: String },

    #[error("Suite '{suite}' test '{case}' has no model file")]
    EmptyModel { suite: String, case: String },

    #[error("Suite '{suite}' test '{case}' has an invalid filter: {source}")]
    InvalidFilter {
        suite: String,
        case: String,
        source: regex::Error,
    },

    #[error("Invalid test filter '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// Split a file stem into `(type, name)`
pub fn parse_suite_stem(stem: &str) -> Option<(&str, &str)> {
    let rest = stem.strip_prefix(SUITE_PREFIX)?;
    let (test_type, name) = rest.split_once('_')?;
    if test_type.is_empty() || name.is_empty() {
        return None;
    }
    Some((test_type, name))
}

/// Finds and loads suites
pub struct SuiteFinder {
    search_paths: Vec<PathBuf>,
    test_type: String,
    filter: Option<GlobMatcher>,
}

impl SuiteFinder {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            test_type: "default".to_string(),
            filter: None,
        }
    }

    pub fn test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = test_type.into();
        self
    }

    /// Keep only tests whose name (or `suite.name`) matches the glob
    pub fn filter(mut self, pattern: Option<&str>) -> Result<Self, DiscoveryError> {
        self.filter = pattern
            .map(|p| {
                Glob::new(p)
                    .map(|g| g.compile_matcher())
                    .map_err(|source| DiscoveryError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .transpose()?;
        Ok(self)
    }

    /// Walk the search paths and load every matching suite file
    pub fn discover(&self) -> Result<Vec<TestSuite>> {
        let mut files = Vec::new();
        for root in &self.search_paths {
            if !root.exists() {
                return Err(EngineError::from(DiscoveryError::MissingPath(root.clone())).into());
            }
            if root.is_file() {
                files.push(root.clone());
            } else {
                collect_files(root, &mut files)
                    .with_context(|| format!("Failed to scan {}", root.display()))?;
            }
        }

        let selected: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| self.is_selected(path))
            .collect();
        debug!("Selected {} suite files", selected.len());

        self.load_all(&selected)
    }

    /// Load explicit suite files, bypassing the naming rules
    pub fn load_files(&self, files: &[PathBuf]) -> Result<Vec<TestSuite>> {
        self.load_all(files)
    }

    fn load_all(&self, files: &[PathBuf]) -> Result<Vec<TestSuite>> {
        let mut seen = HashSet::new();
        let mut suites = Vec::new();

        for path in files {
            let mut suite = load_suite(path).map_err(|e| EngineError::InvalidSuite {
                path: path.clone(),
                message: format!("{e:#}"),
            })?;
            if !seen.insert(suite.name.clone()) {
                warn!(
                    "Duplicate suite '{}' in {} ignored",
                    suite.name,
                    path.display()
                );
                continue;
            }

            if let Some(filter) = &self.filter {
                let name = suite.name.clone();
                suite.cases.retain(|case| {
                    filter.is_match(&case.name) || filter.is_match(format!("{name}.{}", case.name))
                });
            }

            if suite.cases.is_empty() {
                debug!("Suite '{}' has no selected tests", suite.name);
                continue;
            }
            debug!("Loaded suite {}", suite);
            suites.push(suite);
        }

        suites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(suites)
    }

    fn is_selected(&self, path: &Path) -> bool {
        let Some((test_type, _)) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_suite_stem)
        else {
            return false;
        };
        self.test_type == ALL_TYPES || self.test_type == test_type
    }
}

fn is_suite_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUITE_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    has_extension
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_suite_stem)
            .is_some()
}

/// Recursively collect suite files, skipping hidden directories
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() {
            if !hidden {
                collect_files(&path, files)?;
            }
        } else if is_suite_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Load and validate a single suite file
pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let mut suite: TestSuite = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse suite file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse suite file: {}", path.display()))?
    };

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let (test_type, default_name) = parse_suite_stem(stem).unwrap_or(("default", stem));
    if suite.name.is_empty() {
        suite.name = default_name.to_string();
    }
    suite.test_type = test_type.to_string();
    suite.path = path.to_path_buf();

    validate_suite(&suite).with_context(|| format!("Invalid suite file: {}", path.display()))?;
    Ok(suite)
}

fn validate_suite(suite: &TestSuite) -> Result<(), DiscoveryError> {
    let mut names = HashSet::new();
    for case in &suite.cases {
        if !names.insert(case.name.as_str()) {
            return Err(DiscoveryError::DuplicateCase {
                suite: suite.name.clone(),
                case: case.name.clone(),
            });
        }
        if case.model.as_os_str().is_empty() {
            return Err(DiscoveryError::EmptyModel {
                suite: suite.name.clone(),
                case: case.name.clone(),
            });
        }
        FilterSet::new(&suite.filters_for(case)).map_err(|source| {
            DiscoveryError::InvalidFilter {
                suite: suite.name.clone(),
                case: case.name.clone(),
                source,
            }
        })?;
    }
    Ok(())
}
