//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::discovery::ALL_TYPES;

/// Regression test engine for the SST simulator
#[derive(Parser, Debug)]
#[command(name = "sst-test-engine")]
#[command(version)]
#[command(about = "Discover, run, and report SST simulator regression suites")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Engine config file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Profile from the config file
    #[arg(long, global = true)]
    pub profile: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test suites
    Run(RunArgs),

    /// List discovered suites and tests
    List(ListArgs),

    /// Re-render a saved run
    Report(ReportArgs),

    /// Inspect or create engine configuration
    Config(ConfigArgs),
}

/// Suite selection shared by `run` and `list`
#[derive(ClapArgs, Debug)]
pub struct SelectionArgs {
    /// Explicit suite files (bypass name-based discovery)
    pub suite_files: Vec<PathBuf>,

    /// Directory searched for suite files (repeatable)
    #[arg(short = 'p', long = "path")]
    pub search_paths: Vec<PathBuf>,

    /// Glob on test names (`name` or `suite.name`)
    #[arg(short = 'w', long = "filter")]
    pub filter: Option<String>,

    /// Suite type to select
    #[arg(long = "type", conflicts_with = "all")]
    pub test_type: Option<String>,

    /// Select suites of every type
    #[arg(long)]
    pub all: bool,

    /// Activate a scenario (repeatable)
    #[arg(short = 's', long = "scenario")]
    pub scenarios: Vec<String>,

    /// MPI ranks per simulation
    #[arg(short, long)]
    pub ranks: Option<u32>,

    /// Threads per rank
    #[arg(short, long)]
    pub threads: Option<u32>,

    /// Path to sstsimulator.conf
    #[arg(long)]
    pub sst_conf: Option<PathBuf>,
}

impl SelectionArgs {
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if !self.search_paths.is_empty() {
            config.search_paths = self.search_paths.clone();
        }
        if let Some(filter) = &self.filter {
            config.test_filter = Some(filter.clone());
        }
        if self.all {
            config.test_type = ALL_TYPES.to_string();
        } else if let Some(test_type) = &self.test_type {
            config.test_type = test_type.clone();
        }
        config.scenarios.extend(self.scenarios.iter().cloned());
        if let Some(ranks) = self.ranks {
            config.ranks = ranks;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(path) = &self.sst_conf {
            config.sst_conf = Some(path.clone());
        }
    }
}

/// Arguments for run command
#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Tests run concurrently
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Timeout in seconds for every test, replacing per-test values
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Simulator binary
    #[arg(long)]
    pub sst: Option<String>,

    /// MPI launcher
    #[arg(long)]
    pub mpirun: Option<String>,

    /// Pass --oversubscribe to the MPI launcher
    #[arg(long)]
    pub oversubscribe: bool,

    /// Output directory for test output and run records
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for JUnit XML files
    #[arg(long)]
    pub junit_dir: Option<PathBuf>,

    /// Keep output files of passing tests
    #[arg(short, long)]
    pub keep_outputs: bool,

    /// Stop launching tests after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl RunArgs {
    pub fn apply_to(&self, config: &mut EngineConfig) {
        self.selection.apply_to(config);
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_override = Some(timeout);
        }
        if let Some(sst) = &self.sst {
            config.sst_path = sst.clone();
        }
        if let Some(mpirun) = &self.mpirun {
            config.mpirun_path = mpirun.clone();
        }
        if self.oversubscribe {
            config.mpi_oversubscribe = true;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(junit_dir) = &self.junit_dir {
            config.junit_dir = Some(junit_dir.clone());
        }
        if self.keep_outputs {
            config.keep_outputs = true;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
    }
}

/// Arguments for list command
#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output format (table, json, json-pretty)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for report command
#[derive(ClapArgs, Debug)]
pub struct ReportArgs {
    /// Run ID (defaults to the most recent run)
    #[arg(long = "run")]
    pub run_id: Option<String>,

    /// Output directory holding run records
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rewrite JUnit files into this directory
    #[arg(long)]
    pub junit_dir: Option<PathBuf>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config command
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write an example config file
    Init {
        /// Destination (defaults to ./sst-test-engine.yaml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "sst-test-engine",
            "run",
            "suites/testsuite_default_ring.yaml",
            "-p",
            "tests",
            "-c",
            "8",
            "-s",
            "multi_rank",
            "-w",
            "ring*",
            "--timeout",
            "300",
            "--fail-fast",
            "-vv",
        ]);

        assert_eq!(args.verbose, 2);
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };
        assert_eq!(run.selection.suite_files.len(), 1);
        assert_eq!(run.concurrency, Some(8));

        let mut config = EngineConfig::default();
        run.apply_to(&mut config);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.search_paths, vec![PathBuf::from("tests")]);
        assert_eq!(config.timeout_override, Some(300));
        assert_eq!(config.test_filter.as_deref(), Some("ring*"));
        assert!(config.is_scenario_active("multi_rank"));
        assert!(config.fail_fast);
        assert!(!config.keep_outputs);
    }

    #[test]
    fn test_all_selects_every_type() {
        let args = Args::parse_from(["sst-test-engine", "list", "--all"]);
        let Command::List(list) = args.command else {
            panic!("Expected List command");
        };
        let mut config = EngineConfig::default();
        list.selection.apply_to(&mut config);
        assert_eq!(config.test_type, ALL_TYPES);
    }

    #[test]
    fn test_type_conflicts_with_all() {
        let result = Args::try_parse_from(["sst-test-engine", "run", "--all", "--type", "extended"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_init() {
        let args = Args::parse_from(["sst-test-engine", "config", "init", "engine.yaml", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, Some(PathBuf::from("engine.yaml")));
                assert!(force);
            }
            _ => panic!("Expected Config init"),
        }
    }

    #[test]
    fn test_report_args() {
        let args = Args::parse_from(["sst-test-engine", "report", "--run", "20260101_000000", "-q"]);
        assert!(args.quiet);
        let Command::Report(report) = args.command else {
            panic!("Expected Report command");
        };
        assert_eq!(report.run_id.as_deref(), Some("20260101_000000"));
        assert_eq!(report.format, "table");
    }
}
