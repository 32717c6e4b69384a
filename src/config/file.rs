//! Configuration file management
//!
//! Handles finding, loading, and validating engine configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::EngineConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./sst-test-engine.yaml",
    "./sst-test-engine.yml",
    "./.sst-test-engine.yaml",
    "~/.config/sst-test-engine/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Named profiles selectable with `--profile`
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            engine: EngineSettings::default(),
            profiles: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        let settings = std::iter::once(("engine", &self.engine))
            .chain(self.profiles.iter().map(|p| (p.name.as_str(), &p.settings)));
        for (origin, s) in settings {
            if s.concurrency == Some(0) {
                anyhow::bail!("Concurrency must be at least 1 (in '{origin}')");
            }
            if s.ranks == Some(0) || s.threads == Some(0) {
                anyhow::bail!("Ranks and threads must be at least 1 (in '{origin}')");
            }
        }

        for (i, profile) in self.profiles.iter().enumerate() {
            if self.profiles[..i].iter().any(|p| p.name == profile.name) {
                anyhow::bail!("Duplicate profile name: {}", profile.name);
            }
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            engine: EngineSettings {
                sst_path: Some("sst".to_string()),
                concurrency: Some(4),
                timeout_secs: Some(120),
                search_paths: Some(vec![PathBuf::from("tests")]),
                ..Default::default()
            },
            profiles: vec![
                Profile {
                    name: "multi-rank".to_string(),
                    description: "Two MPI ranks, two threads each".to_string(),
                    scenarios: vec!["multi_rank".to_string()],
                    settings: EngineSettings {
                        ranks: Some(2),
                        threads: Some(2),
                        concurrency: Some(2),
                        ..Default::default()
                    },
                },
                Profile {
                    name: "nightly".to_string(),
                    description: "Every suite type with generous timeouts".to_string(),
                    scenarios: Vec::new(),
                    settings: EngineSettings {
                        test_type: Some("all".to_string()),
                        timeout_secs: Some(600),
                        ..Default::default()
                    },
                },
            ],
        }
    }

    /// Get profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

/// Engine settings as written in a config file; unset fields keep the lower layer
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sst_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpirun_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpi_oversubscribe: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junit_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_outputs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_fast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_paths: Option<Vec<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sst_conf: Option<PathBuf>,
}

impl EngineSettings {
    /// Overlay the set fields onto a configuration
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(v) = &self.sst_path {
            config.sst_path = v.clone();
        }
        if let Some(v) = &self.mpirun_path {
            config.mpirun_path = v.clone();
        }
        if let Some(v) = self.mpi_oversubscribe {
            config.mpi_oversubscribe = v;
        }
        if let Some(v) = self.ranks {
            config.ranks = v;
        }
        if let Some(v) = self.threads {
            config.threads = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
        if let Some(v) = &self.output_dir {
            config.output_dir = v.clone();
        }
        if let Some(v) = &self.junit_dir {
            config.junit_dir = Some(v.clone());
        }
        if let Some(v) = self.keep_outputs {
            config.keep_outputs = v;
        }
        if let Some(v) = self.fail_fast {
            config.fail_fast = v;
        }
        if let Some(v) = &self.test_type {
            config.test_type = v.clone();
        }
        if let Some(v) = &self.search_paths {
            config.search_paths = v.clone();
        }
        if let Some(v) = &self.sst_conf {
            config.sst_conf = Some(v.clone());
        }
    }
}

/// Named set of scenarios and overrides
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scenarios: Vec<String>,
    #[serde(flatten)]
    pub settings: EngineSettings,
}

impl Profile {
    pub fn apply_to(&self, config: &mut EngineConfig) {
        self.settings.apply_to(config);
        for scenario in &self.scenarios {
            if !config.is_scenario_active(scenario) {
                config.scenarios.push(scenario.clone());
            }
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();

        for name in ["config.yaml", "config.json"] {
            let path = dir.path().join(name);
            let config = ConfigFile::example();
            config.save(&path).unwrap();

            let loaded = ConfigFile::load(&path).unwrap();
            assert_eq!(loaded.version, config.version);
            assert_eq!(loaded.engine.concurrency, Some(4));
            assert_eq!(loaded.profiles.len(), 2);
            assert_eq!(loaded.profile("multi-rank").unwrap().settings.ranks, Some(2));
        }
    }

    #[test]
    fn test_validate_config() {
        let mut config = ConfigFile::default();
        config.version = "9.9".to_string();
        assert!(config.validate().is_err());

        let mut config = ConfigFile::example();
        config.profiles[0].settings.concurrency = Some(0);
        assert!(config.validate().is_err());

        let mut config = ConfigFile::example();
        let duplicate = config.profiles[0].clone();
        config.profiles.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_adds_scenarios_once() {
        let file = ConfigFile::example();
        let mut config = EngineConfig::default().with_scenario("multi_rank");
        file.profile("multi-rank").unwrap().apply_to(&mut config);

        assert_eq!(config.scenarios, vec!["multi_rank".to_string()]);
        assert_eq!(config.ranks, 2);
        assert_eq!(config.threads, 2);
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
