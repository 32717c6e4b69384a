//! sstsimulator.conf reader
//!
//! The simulator install records its configuration and registered element
//! libraries in an INI file. Tests consult it to skip cases whose elements
//! are not installed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONF_FILE_NAME: &str = "sstsimulator.conf";

/// Sections listing registered element libraries
const ELEMENT_SECTIONS: &[&str] = &["SST_ELEMENT_SOURCE", "SST_ELEMENT_TESTS"];

/// sstsimulator.conf errors
#[derive(Error, Debug)]
pub enum ConfError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Parsed sstsimulator.conf
#[derive(Clone, Debug, Default)]
pub struct SstConf {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl SstConf {
    /// Parse INI text
    pub fn parse(content: &str) -> Result<Self, ConfError> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Indented lines continue the previous value
            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    if let Some(value) = sections.get_mut(section).and_then(|s| s.get_mut(key)) {
                        value.push('\n');
                        value.push_str(trimmed);
                        continue;
                    }
                }
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| ConfError::Parse {
                    line: line_no,
                    message: format!("unterminated section header: {trimmed}"),
                })?;
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                last_key = None;
                continue;
            }

            let section = current.as_ref().ok_or_else(|| ConfError::Parse {
                line: line_no,
                message: "key outside of any section".to_string(),
            })?;

            let split = trimmed
                .find(['=', ':'])
                .ok_or_else(|| ConfError::Parse {
                    line: line_no,
                    message: format!("expected 'key = value', found: {trimmed}"),
                })?;
            let key = trimmed[..split].trim().to_string();
            let value = trimmed[split + 1..].trim().to_string();
            if key.is_empty() {
                return Err(ConfError::Parse {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }

            sections
                .entry(section.clone())
                .or_default()
                .insert(key.clone(), value);
            last_key = Some(key);
        }

        Ok(Self { sections })
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Locate the file: explicit path, then `SST_CONFIG_FILE`, then `~/.sst/`
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("SST_CONFIG_FILE") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".sst").join(CONF_FILE_NAME))
            .filter(|path| path.exists())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Whether an element library is registered with the install
    pub fn has_element(&self, name: &str) -> bool {
        ELEMENT_SECTIONS.iter().any(|section| {
            self.sections
                .get(*section)
                .map(|keys| keys.contains_key(name))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Generated by the installer
[SST_CORE]
PREFIX = /opt/sst
VERSION: 14.0.0

[SST_ELEMENT_SOURCE]
merlin=/src/elements/merlin
memHierarchy = /src/elements/memHierarchy

[SST_ELEMENT_TESTS]
simpleElementExample = /src/elements/simpleElementExample/tests

[paths]
; comment
LIBS = -lfoo
  -lbar
"#;

    #[test]
    fn test_parse_sections_and_keys() {
        let conf = SstConf::parse(SAMPLE).unwrap();
        assert_eq!(conf.get("SST_CORE", "PREFIX"), Some("/opt/sst"));
        assert_eq!(conf.get("SST_CORE", "VERSION"), Some("14.0.0"));
        assert_eq!(conf.get("SST_CORE", "missing"), None);
        assert_eq!(conf.sections().count(), 4);
    }

    #[test]
    fn test_continuation_lines() {
        let conf = SstConf::parse(SAMPLE).unwrap();
        assert_eq!(conf.get("paths", "LIBS"), Some("-lfoo\n-lbar"));
    }

    #[test]
    fn test_has_element() {
        let conf = SstConf::parse(SAMPLE).unwrap();
        assert!(conf.has_element("merlin"));
        assert!(conf.has_element("simpleElementExample"));
        assert!(!conf.has_element("ariel"));
    }

    #[test]
    fn test_later_duplicates_override() {
        let conf = SstConf::parse("[a]\nk = 1\nk = 2\n").unwrap();
        assert_eq!(conf.get("a", "k"), Some("2"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SstConf::parse("key = value\n"),
            Err(ConfError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            SstConf::parse("[ok]\nno separator here\n"),
            Err(ConfError::Parse { line: 2, .. })
        ));
        assert!(SstConf::parse("[broken\n").is_err());
    }

    #[test]
    fn test_locate_explicit() {
        let path = PathBuf::from("/nonexistent/sstsimulator.conf");
        assert_eq!(SstConf::locate(Some(&path)), Some(path));
    }
}
