//! SST Test Engine - regression test runner for the SST simulator
//!
//! Discovers `testsuite_<type>_<name>.yaml` suite files, runs every test case
//! through `sst` (optionally under `mpirun`) with bounded concurrency, compares
//! output against reference files, and writes JUnit XML per suite.
//!
//! ## Usage
//!
//! ```bash
//! # Run the default suites under ./tests with 8 concurrent tests
//! sst-test-engine run -p tests -c 8
//!
//! # Run one suite file on 2 ranks, only tests matching a glob
//! sst-test-engine run tests/testsuite_default_merlin.yaml -r 2 -w 'torus*'
//!
//! # List every suite of every type
//! sst-test-engine list --all
//!
//! # Re-render the most recent run as JSON
//! sst-test-engine report --format json
//! ```
//!
//! Exit status: 0 when every test passed, 1 on failures or errors, 2 on
//! configuration or discovery errors, 130 when interrupted.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod cli;
mod compare;
mod config;
mod discovery;
mod error;
mod executor;
mod models;
mod output;
mod process;
mod results;
mod utils;

use cli::{Args, Command, ConfigAction, ListArgs, ReportArgs, RunArgs};
use config::{print_env_help, ConfigFile, EngineConfig, EnvConfig, SstConf};
use discovery::SuiteFinder;
use error::EngineError;
use executor::{ParallelExecutor, ResultSink, TestRunner};
use models::TestSuite;
use output::{CaseListing, OutputFormat, ResultFormatter};
use results::{JunitWriter, RunStore, StoredRun};
use utils::crash::install_crash_handler;
use utils::logger::{init_logger, LogLevel};
use utils::timer::Stopwatch;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = match (args.verbose, env.verbose) {
        (0, Some(true)) => 1,
        (v, _) => v,
    };
    init_logger(LogLevel::from_verbosity(verbose, args.quiet));

    let code = match dispatch(args, env).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<EngineError>()
                .map(EngineError::exit_code)
                .unwrap_or(2)
        }
    };

    std::process::exit(code);
}

async fn dispatch(args: Args, env: EnvConfig) -> Result<i32> {
    let base_config =
        || EngineConfig::resolve(args.config.as_deref(), args.profile.as_deref(), &env);

    match args.command {
        Command::Run(run_args) => {
            let mut config = base_config()?;
            run_args.apply_to(&mut config);
            fs::create_dir_all(&config.output_dir)
                .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;
            install_crash_handler(&config.output_dir);
            run_tests(config, &run_args).await
        }
        Command::List(list_args) => {
            let mut config = base_config()?;
            list_args.selection.apply_to(&mut config);
            list_tests(config, &list_args)
        }
        Command::Report(report_args) => show_report(base_config()?, &report_args),
        Command::Config(config_args) => match config_args.action {
            ConfigAction::Show => {
                let config = base_config()?;
                print!("{}", serde_yaml::to_string(&config)?);
                show_sst_install(&config)?;
                Ok(0)
            }
            ConfigAction::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from("sst-test-engine.yaml"));
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                ConfigFile::example().save(&path)?;
                println!("Wrote example config to {}", path.display());
                Ok(0)
            }
            ConfigAction::Env => {
                print_env_help();
                if env.has_any() {
                    println!();
                    env.print_summary();
                }
                Ok(0)
            }
        },
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(format).with_context(|| format!("Unknown output format: {format}"))
}

fn load_suites(config: &EngineConfig, explicit: &[PathBuf]) -> Result<Vec<TestSuite>> {
    let finder = SuiteFinder::new(config.search_paths.clone())
        .test_type(&config.test_type)
        .filter(config.test_filter.as_deref())
        .map_err(EngineError::from)?;

    if explicit.is_empty() {
        finder.discover()
    } else {
        finder.load_files(explicit)
    }
}

fn load_sst_conf(config: &EngineConfig) -> Result<Option<SstConf>> {
    match SstConf::locate(config.sst_conf.as_deref()) {
        Some(path) => {
            debug!("Reading element registry from {}", path.display());
            let conf = SstConf::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok(Some(conf))
        }
        None => {
            debug!("No sstsimulator.conf found");
            Ok(None)
        }
    }
}

fn show_sst_install(config: &EngineConfig) -> Result<()> {
    let Some(path) = SstConf::locate(config.sst_conf.as_deref()) else {
        println!("# sstsimulator.conf: not found");
        return Ok(());
    };
    let conf = load_sst_conf(config)?.unwrap_or_default();
    println!("# sstsimulator.conf: {}", path.display());
    if let Some(version) = conf.get("SST_CORE", "VERSION") {
        println!("# SST core version: {version}");
    }
    println!("# sections: {}", conf.sections().collect::<Vec<_>>().join(", "));
    Ok(())
}

fn formatter_for(format: OutputFormat) -> ResultFormatter {
    let formatter = ResultFormatter::new(format);
    if std::io::stdout().is_terminal() {
        formatter
    } else {
        formatter.no_color()
    }
}

async fn run_tests(config: EngineConfig, args: &RunArgs) -> Result<i32> {
    config.validate()?;
    let format = parse_format(&args.format)?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let mut stopwatch = Stopwatch::new();
    let suites = load_suites(&config, &args.selection.suite_files)?;
    let sst_conf = load_sst_conf(&config)?;
    stopwatch.lap("discover");

    if suites.is_empty() {
        warn!("No test suites selected");
    }
    info!(
        "Selected {} suites, {} tests",
        suites.len(),
        suites.iter().map(|s| s.cases.len()).sum::<usize>()
    );

    let config = Arc::new(config);
    let formatter = formatter_for(format);
    let sink = Arc::new(ResultSink::new(
        &suites,
        formatter.clone(),
        format.streams_progress(),
    ));
    let runner = Arc::new(TestRunner::new(config.clone()).with_sst_conf(sst_conf));
    let executor =
        ParallelExecutor::new(runner, config.concurrency).fail_fast(config.fail_fast);

    let started_at = Utc::now();
    let (summary, interrupted) = match executor.run(Arc::new(suites), sink.clone()).await {
        Ok(summary) => (summary, false),
        Err(EngineError::Interrupted) => (sink.finish(true).await, true),
        Err(e) => return Err(e.into()),
    };
    stopwatch.lap("execute");

    println!("{}", formatter.format_run(&summary));

    JunitWriter::new(config.junit_dir()).write_run(&summary)?;
    let success = summary.is_success();
    RunStore::new(&config.output_dir).save(&StoredRun::new(started_at, summary, &config))?;
    stopwatch.lap("report");
    debug!("Timing: {}", stopwatch.format());

    Ok(if interrupted {
        EngineError::Interrupted.exit_code()
    } else if success {
        0
    } else {
        1
    })
}

fn list_tests(config: EngineConfig, args: &ListArgs) -> Result<i32> {
    let format = parse_format(&args.format)?;
    let suites = load_suites(&config, &args.selection.suite_files)?;
    let sst_conf = load_sst_conf(&config)?;
    let runner = TestRunner::new(Arc::new(config)).with_sst_conf(sst_conf);

    let cases: Vec<CaseListing> = suites
        .iter()
        .flat_map(|suite| {
            let runner = &runner;
            suite.cases.iter().map(move |case| CaseListing {
                suite: suite.name.clone(),
                test_type: suite.test_type.clone(),
                name: case.name.clone(),
                model: case.model.clone(),
                skip: runner.skip_reason(suite, case),
            })
        })
        .collect();

    println!("{}", formatter_for(format).format_listing(&cases));
    Ok(0)
}

fn show_report(config: EngineConfig, args: &ReportArgs) -> Result<i32> {
    let format = parse_format(&args.format)?;
    let output_dir = args.output.clone().unwrap_or(config.output_dir);
    let store = RunStore::new(&output_dir);

    let run = match &args.run_id {
        Some(id) => store.load(id)?,
        None => store
            .latest()?
            .with_context(|| format!("No saved runs under {}", output_dir.display()))?,
    };
    info!("Reporting run {}", run.id);

    println!("{}", formatter_for(format).format_run(&run.summary));

    let junit_dir = args
        .junit_dir
        .clone()
        .unwrap_or_else(|| run.config.junit_dir());
    JunitWriter::new(junit_dir).write_run(&run.summary)?;

    Ok(if run.summary.is_success() { 0 } else { 1 })
}
