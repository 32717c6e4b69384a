//! Line filters applied to simulator output before comparison

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single line transformation, declared in suite files
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFilter {
    /// Drop lines starting with the prefix
    StartsWith(String),
    /// Drop lines containing the text
    Contains(String),
    /// Cut everything after the marker, keeping the marker
    IgnoreAllAfter(String),
    /// Delete every regex match from the line
    RemoveRegex(String),
    /// Replace text in the line
    Replace { from: String, to: String },
    /// Drop the first line only, and only if it starts with the prefix
    CheckFirstLine(String),
}

enum CompiledFilter {
    StartsWith(String),
    Contains(String),
    IgnoreAllAfter(String),
    RemoveRegex(Regex),
    Replace(String, String),
    CheckFirstLine(String),
}

/// Filters ready to run over output text
pub struct FilterSet {
    filters: Vec<CompiledFilter>,
}

impl FilterSet {
    /// Compile the filters; fails on an invalid regex
    pub fn new(filters: &[LineFilter]) -> Result<Self, regex::Error> {
        let filters = filters
            .iter()
            .map(|f| {
                Ok(match f {
                    LineFilter::StartsWith(p) => CompiledFilter::StartsWith(p.clone()),
                    LineFilter::Contains(t) => CompiledFilter::Contains(t.clone()),
                    LineFilter::IgnoreAllAfter(m) => CompiledFilter::IgnoreAllAfter(m.clone()),
                    LineFilter::RemoveRegex(r) => CompiledFilter::RemoveRegex(Regex::new(r)?),
                    LineFilter::Replace { from, to } => {
                        CompiledFilter::Replace(from.clone(), to.clone())
                    }
                    LineFilter::CheckFirstLine(p) => CompiledFilter::CheckFirstLine(p.clone()),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { filters })
    }

    pub fn empty() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter over each line; lines left empty are dropped
    pub fn apply(&self, text: &str) -> Vec<String> {
        text.lines()
            .enumerate()
            .filter_map(|(index, line)| self.apply_line(index, line))
            .collect()
    }

    fn apply_line(&self, index: usize, line: &str) -> Option<String> {
        let mut line = line.trim_end().to_string();

        for filter in &self.filters {
            match filter {
                CompiledFilter::StartsWith(prefix) => {
                    if line.starts_with(prefix.as_str()) {
                        return None;
                    }
                }
                CompiledFilter::Contains(text) => {
                    if line.contains(text.as_str()) {
                        return None;
                    }
                }
                CompiledFilter::IgnoreAllAfter(marker) => {
                    if let Some(pos) = line.find(marker.as_str()) {
                        line.truncate(pos + marker.len());
                    }
                }
                CompiledFilter::RemoveRegex(re) => {
                    line = re.replace_all(&line, "").into_owned();
                }
                CompiledFilter::Replace(from, to) => {
                    line = line.replace(from.as_str(), to);
                }
                CompiledFilter::CheckFirstLine(prefix) => {
                    if index == 0 && line.starts_with(prefix.as_str()) {
                        return None;
                    }
                }
            }
        }

        let line = line.trim_end();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}
