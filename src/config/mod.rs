//! Configuration module
//!
//! The engine configuration is an explicit object handed to every
//! component. It is layered: defaults, then the config file (and an optional
//! profile from it), then `SST_TEST_*` environment variables, then CLI flags.

mod env;
mod file;
mod sstconf;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;
pub use sstconf::SstConf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Engine configuration shared by discovery, execution, and reporting
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Simulator binary
    pub sst_path: String,

    /// MPI launcher used when ranks > 1
    pub mpirun_path: String,

    /// Pass `--oversubscribe` to the MPI launcher
    pub mpi_oversubscribe: bool,

    /// MPI ranks per simulation
    pub ranks: u32,

    /// Simulator threads per rank
    pub threads: u32,

    /// Test cases allowed in flight at once
    pub concurrency: usize,

    /// Default per-test timeout in seconds
    pub timeout_secs: u64,

    /// Replaces every per-test timeout when set
    pub timeout_override: Option<u64>,

    /// Active scenarios
    pub scenarios: Vec<String>,

    /// Root for per-test output files
    pub output_dir: PathBuf,

    /// JUnit output directory (defaults to `<output_dir>/test_xml_out`)
    pub junit_dir: Option<PathBuf>,

    /// Keep outputs of passing tests
    pub keep_outputs: bool,

    /// Stop launching tests after the first failure
    pub fail_fast: bool,

    /// Glob applied to test names
    pub test_filter: Option<String>,

    /// Suite file type to select (`all` selects every type)
    pub test_type: String,

    /// Directories searched for suite files
    pub search_paths: Vec<PathBuf>,

    /// Explicit sstsimulator.conf location
    pub sst_conf: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sst_path: "sst".to_string(),
            mpirun_path: "mpirun".to_string(),
            mpi_oversubscribe: false,
            ranks: 1,
            threads: 1,
            concurrency: 1,
            timeout_secs: 60,
            timeout_override: None,
            scenarios: Vec::new(),
            output_dir: PathBuf::from("./test_outputs"),
            junit_dir: None,
            keep_outputs: false,
            fail_fast: false,
            test_filter: None,
            test_type: "default".to_string(),
            search_paths: vec![PathBuf::from(".")],
            sst_conf: None,
        }
    }
}

impl EngineConfig {
    /// Build the layered configuration (everything except CLI flags)
    pub fn resolve(
        config_path: Option<&Path>,
        profile: Option<&str>,
        env: &EnvConfig,
    ) -> Result<Self> {
        let file = match config_path.map(PathBuf::from).or_else(|| env.config_file.clone()) {
            Some(path) => Some(ConfigFile::load(&path)?),
            None => match ConfigFile::find() {
                Some(path) => {
                    debug!("Using config file {}", path.display());
                    Some(ConfigFile::load(&path)?)
                }
                None => None,
            },
        };

        let mut config = Self::default();
        if let Some(file) = &file {
            file.engine.apply_to(&mut config);
            if let Some(name) = profile {
                let profile = file
                    .profile(name)
                    .with_context(|| format!("Unknown profile: {name}"))?;
                profile.apply_to(&mut config);
            }
        } else if let Some(name) = profile {
            anyhow::bail!("Profile '{name}' requested but no config file was found");
        }

        env.apply_to(&mut config);
        Ok(config)
    }

    pub fn is_scenario_active(&self, scenario: &str) -> bool {
        self.scenarios.iter().any(|s| s == scenario)
    }

    pub fn junit_dir(&self) -> PathBuf {
        self.junit_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("test_xml_out"))
    }

    /// Timeout for a test after applying the global override
    pub fn effective_timeout(&self, test_timeout: Option<u64>) -> u64 {
        self.timeout_override
            .or(test_timeout)
            .unwrap_or(self.timeout_secs)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.ranks == 0 || self.threads == 0 {
            anyhow::bail!("Ranks and threads must be at least 1");
        }
        if self.timeout_override == Some(0) || self.timeout_secs == 0 {
            anyhow::bail!("Timeouts must be at least 1 second");
        }
        if self.sst_path.trim().is_empty() {
            anyhow::bail!("Simulator path is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
impl EngineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_ranks(mut self, ranks: u32) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenarios.push(scenario.into());
        self
    }

    pub fn with_sst_path(mut self, path: impl Into<String>) -> Self {
        self.sst_path = path.into();
        self
    }
}
