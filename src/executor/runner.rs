//! Test case runner
//!
//! Runs one case through the simulator and classifies the outcome.

use anyhow::Context;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parallel::CaseRunner;
use crate::compare::{compare_output, CompareMode, FilterSet};
use crate::config::{EngineConfig, SstConf};
use crate::models::{TestCase, TestResult, TestSuite};
use crate::process::{run_with_timeout, ProcessIo, SimCommand};
use crate::utils::timer::Timer;

/// Runs test cases against the configured simulator
pub struct TestRunner {
    config: Arc<EngineConfig>,
    sst_conf: Option<SstConf>,
}

impl TestRunner {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            sst_conf: None,
        }
    }

    /// Element registry used to honor `requires_elements`
    pub fn with_sst_conf(mut self, conf: Option<SstConf>) -> Self {
        self.sst_conf = conf;
        self
    }

    /// Reason the case will not run, if any
    pub fn skip_reason(&self, suite: &TestSuite, case: &TestCase) -> Option<String> {
        if let Some(reason) = &case.skip {
            return Some(reason.clone());
        }

        if let Some(scenario) = case
            .skip_on_scenarios
            .iter()
            .find(|s| self.config.is_scenario_active(s))
        {
            return Some(format!("skipped for scenario '{scenario}'"));
        }

        if let Some(max) = suite.max_ranks_for(case) {
            if self.config.ranks > max {
                return Some(format!(
                    "requires at most {max} ranks (running with {})",
                    self.config.ranks
                ));
            }
        }

        if let Some(max) = suite.max_threads_for(case) {
            if self.config.threads > max {
                return Some(format!(
                    "requires at most {max} threads (running with {})",
                    self.config.threads
                ));
            }
        }

        for element in suite.required_elements_for(case) {
            let registered = self
                .sst_conf
                .as_ref()
                .map(|conf| conf.has_element(element))
                .unwrap_or(false);
            if !registered {
                return Some(format!("element '{element}' is not registered"));
            }
        }

        None
    }

    /// Run a case and classify the result
    pub async fn run(&self, suite: &TestSuite, case: &TestCase) -> TestResult {
        if let Some(reason) = self.skip_reason(suite, case) {
            debug!("Skipping {}.{}: {}", suite.name, case.name, reason);
            return TestResult::skip(suite, case, reason);
        }

        info!("Running {}.{}", suite.name, case);
        let timer = Timer::start(format!("{}.{}", suite.name, case.name));

        let result = match self.execute(suite, case, &timer).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{}.{} errored: {:#}", suite.name, case.name, e);
                TestResult::error(suite, case, format!("{e:#}"))
            }
        };

        result.with_duration(timer.stop().as_millis() as u64)
    }

    async fn execute(
        &self,
        suite: &TestSuite,
        case: &TestCase,
        timer: &Timer,
    ) -> anyhow::Result<TestResult> {
        let out_dir = self.config.output_dir.join(&suite.name);
        fs::create_dir_all(&out_dir)?;

        let suite_dir = absolute(suite.dir());
        let out_dir = absolute(&out_dir);
        let placeholders = Placeholders {
            suite_dir: &suite_dir,
            output_dir: &out_dir,
            test_name: &case.name,
        };

        let command = SimCommand::from_config(&self.config, &case.model)
            .args(case.args.iter().map(|arg| placeholders.expand(arg)))
            .model_options(case.model_options.as_deref().map(|o| placeholders.expand(o)));
        debug!("{}", command);

        let io = ProcessIo::new(&suite_dir, &out_dir, &case.name);

        let timeout = self.config.effective_timeout(suite.timeout_for(case));
        let outcome = run_with_timeout(&command, &io, Duration::from_secs(timeout)).await?;
        let elapsed = timer.elapsed_ms();
        let outputs = |r: TestResult| {
            r.with_outputs(Some(io.stdout.clone()), Some(io.stderr.clone()))
        };

        if outcome.timed_out {
            return Ok(outputs(
                TestResult::fail(suite, case, elapsed, format!("timed out after {timeout}s"))
                    .timed_out(),
            ));
        }

        if outcome.exit_code != Some(case.expect_exit_code) {
            return Ok(outputs(TestResult::fail(
                suite,
                case,
                elapsed,
                format!("{} (expected {})", outcome.describe(), case.expect_exit_code),
            )));
        }

        let actual = read_lossy(&io.stdout)?;

        let mode = suite.compare_mode_for(case);
        if mode != CompareMode::None {
            let Some(reference) = &case.reference else {
                return Ok(outputs(TestResult::error(
                    suite,
                    case,
                    format!("compare mode {mode:?} requires a reference file"),
                )));
            };
            let reference = suite.dir().join(reference);
            let expected = match fs::read(&reference) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    return Ok(outputs(TestResult::error(
                        suite,
                        case,
                        format!("cannot read reference {}: {e}", reference.display()),
                    )));
                }
            };

            let filters = match mode {
                CompareMode::Filtered => FilterSet::new(&suite.filters_for(case))?,
                _ => FilterSet::empty(),
            };
            let comparison = compare_output(mode, &filters, &actual, &expected);
            if !comparison.matches() {
                let message = format!(
                    "output differs from reference in {} lines ({} expected, {} actual)",
                    comparison.total_differences,
                    comparison.expected_lines,
                    comparison.actual_lines
                );
                return Ok(outputs(
                    TestResult::fail(suite, case, elapsed, message)
                        .with_details(comparison.render()),
                ));
            }
        }

        if let Some(missing) = case
            .expect_contains
            .iter()
            .find(|text| !actual.contains(text.as_str()))
        {
            return Ok(outputs(TestResult::fail(
                suite,
                case,
                elapsed,
                format!("output does not contain '{missing}'"),
            )));
        }

        if self.config.keep_outputs {
            return Ok(outputs(TestResult::pass(suite, case, elapsed)));
        }
        for path in [&io.stdout, &io.stderr] {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove {}: {}", path.display(), e);
            }
        }
        Ok(TestResult::pass(suite, case, elapsed))
    }
}

#[async_trait]
impl CaseRunner for TestRunner {
    async fn run_case(&self, suite: &TestSuite, case: &TestCase) -> TestResult {
        self.run(suite, case).await
    }
}

/// Values substituted into case arguments and model options
struct Placeholders<'a> {
    suite_dir: &'a Path,
    output_dir: &'a Path,
    test_name: &'a str,
}

impl Placeholders<'_> {
    fn expand(&self, text: &str) -> String {
        text.replace("{suite_dir}", &self.suite_dir.to_string_lossy())
            .replace("{output_dir}", &self.output_dir.to_string_lossy())
            .replace("{test_name}", self.test_name)
    }
}

/// Simulator output is arbitrary bytes; invalid UTF-8 is replaced
fn read_lossy(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
