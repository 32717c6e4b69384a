//! Serialized result forwarding
//!
//! Every finished test hands its result to the sink, which records it and
//! reports it to the console while holding a single lock.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{RunSummary, SuiteSummary, TestResult, TestSuite};
use crate::output::ResultFormatter;

struct SuiteSlots {
    name: String,
    class_name: String,
    started_at: Option<DateTime<Utc>>,
    results: Vec<Option<TestResult>>,
}

struct SinkState {
    suites: Vec<SuiteSlots>,
    completed: usize,
    total: usize,
}

/// Collects results from concurrent tests
pub struct ResultSink {
    state: Mutex<SinkState>,
    closed: AtomicBool,
    formatter: ResultFormatter,
    echo: bool,
}

impl ResultSink {
    /// Create a sink with one slot per case; `echo` prints progress lines
    pub fn new(suites: &[TestSuite], formatter: ResultFormatter, echo: bool) -> Self {
        let slots = suites
            .iter()
            .map(|suite| SuiteSlots {
                name: suite.name.clone(),
                class_name: suite.class_name().to_string(),
                started_at: None,
                results: vec![None; suite.cases.len()],
            })
            .collect();

        Self {
            state: Mutex::new(SinkState {
                suites: slots,
                completed: 0,
                total: suites.iter().map(|s| s.cases.len()).sum(),
            }),
            closed: AtomicBool::new(false),
            formatter,
            echo,
        }
    }

    /// Mark a suite as started; the first call wins
    pub async fn suite_started(&self, suite: usize) {
        let mut state = self.state.lock().await;
        if let Some(slots) = state.suites.get_mut(suite) {
            slots.started_at.get_or_insert_with(Utc::now);
        }
    }

    /// Record and report a result. Returns false once the sink is closed.
    pub async fn forward(&self, suite: usize, case: usize, result: TestResult) -> bool {
        let mut state = self.state.lock().await;
        if self.is_closed() {
            debug!("Dropping result for {} after close", result.qualified_name());
            return false;
        }
        debug!("{}", result);

        state.completed += 1;
        if self.echo {
            let line = self
                .formatter
                .format_progress(&result, state.completed, state.total);
            let failure = self.formatter.format_failure(&result);

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let _ = writeln!(out, "{line}");
            if let Some(failure) = failure {
                let _ = writeln!(out, "{failure}");
            }
            let _ = out.flush();
        }

        if let Some(slot) = state
            .suites
            .get_mut(suite)
            .and_then(|s| s.results.get_mut(case))
        {
            *slot = Some(result);
        }
        true
    }

    /// Stop accepting results
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Build the run summary in suite and declaration order
    pub async fn finish(&self, interrupted: bool) -> RunSummary {
        let state = self.state.lock().await;
        let suites = state
            .suites
            .iter()
            .filter_map(|slots| {
                let results: Vec<TestResult> = slots.results.iter().flatten().cloned().collect();
                if results.is_empty() {
                    return None;
                }
                Some(SuiteSummary::new(
                    slots.name.clone(),
                    slots.class_name.clone(),
                    slots.started_at.unwrap_or_else(Utc::now),
                    results,
                ))
            })
            .collect();

        RunSummary::new(suites, interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestCase, TestStatus};
    use crate::output::OutputFormat;
    use std::path::PathBuf;

    fn suite(name: &str, cases: &[&str]) -> TestSuite {
        TestSuite {
            name: name.to_string(),
            class_name: None,
            requires_elements: Vec::new(),
            defaults: Default::default(),
            cases: cases.iter().map(|c| TestCase::new(*c, "m.py")).collect(),
            path: PathBuf::from(format!("testsuite_default_{name}.yaml")),
            test_type: "default".to_string(),
        }
    }

    fn sink(suites: &[TestSuite]) -> ResultSink {
        ResultSink::new(suites, ResultFormatter::new(OutputFormat::Json), false)
    }

    #[tokio::test]
    async fn test_finish_keeps_declaration_order() {
        let suites = vec![suite("alpha", &["a1", "a2"]), suite("beta", &["b1"])];
        let sink = sink(&suites);

        sink.suite_started(1).await;
        sink.forward(1, 0, TestResult::pass(&suites[1], &suites[1].cases[0], 5))
            .await;
        sink.suite_started(0).await;
        sink.forward(0, 1, TestResult::pass(&suites[0], &suites[0].cases[1], 5))
            .await;
        sink.forward(0, 0, TestResult::fail(&suites[0], &suites[0].cases[0], 5, "x"))
            .await;

        let summary = sink.finish(false).await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.suites[0].suite, "alpha");
        let names: Vec<_> = summary.suites[0]
            .results
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_closed_sink_drops_results() {
        let suites = vec![suite("alpha", &["a1", "a2"]), suite("beta", &["b1"])];
        let sink = sink(&suites);

        assert!(
            sink.forward(0, 0, TestResult::pass(&suites[0], &suites[0].cases[0], 1))
                .await
        );
        sink.close();
        assert!(sink.is_closed());
        assert!(
            !sink
                .forward(0, 1, TestResult::pass(&suites[0], &suites[0].cases[1], 1))
                .await
        );

        let summary = sink.finish(true).await;
        assert!(summary.interrupted);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.suites.len(), 1);
        assert_eq!(summary.suites[0].results[0].status, TestStatus::Pass);
    }
}
