//! Run storage and retrieval
//!
//! Each run is saved as pretty JSON under `<output_dir>/runs/<run_id>.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::models::RunSummary;

/// A saved engine run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub summary: RunSummary,

    /// Configuration the run used
    pub config: EngineConfig,

    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(
        started_at: DateTime<Utc>,
        summary: RunSummary,
        config: &EngineConfig,
    ) -> Self {
        Self {
            id: generate_run_id(),
            started_at,
            completed_at: Utc::now(),
            summary,
            config: config.clone(),
            environment: EnvironmentInfo::default(),
        }
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    static SEQUENCE: AtomicU32 = AtomicU32::new(0);
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10000;
    format!("{timestamp}_{seq:04}")
}

/// Run storage manager
pub struct RunStore {
    base_dir: PathBuf,
}

impl RunStore {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: output_dir.as_ref().join("runs"),
        }
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Save a run
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("Failed to create {}", self.base_dir.display()))?;

        let path = self.run_path(&run.id);
        let file = File::create(&path).context("Failed to create run file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), run)
            .context("Failed to write run")?;

        info!("Saved run {} to {}", run.id, path.display());
        Ok(path)
    }

    /// Load a run by ID
    pub fn load(&self, run_id: &str) -> Result<StoredRun> {
        let path = self.run_path(run_id);
        load_from_path(&path).with_context(|| format!("Unknown run: {run_id}"))
    }

    /// All runs, newest first
    pub fn list(&self) -> Result<Vec<StoredRun>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match load_from_path(&path) {
                    Ok(run) => runs.push(run),
                    Err(e) => debug!("Failed to load {}: {:#}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(runs)
    }

    /// Most recent run
    pub fn latest(&self) -> Result<Option<StoredRun>> {
        Ok(self.list()?.into_iter().next())
    }
}

fn load_from_path(path: &Path) -> Result<StoredRun> {
    let file = File::open(path).context("Failed to open run file")?;
    serde_json::from_reader(BufReader::new(file)).context("Failed to parse run file")
}
