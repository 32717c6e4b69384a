//! Test result models
//!
//! Defines test status, per-case results, and suite/run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::suite::{TestCase, TestSuite};

/// Test execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Pass => "✓",
            TestStatus::Fail => "✗",
            TestStatus::Skip => "○",
            TestStatus::Error => "!",
        }
    }

    /// Failures and errors both count against the run
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => write!(f, "PASS"),
            TestStatus::Fail => write!(f, "FAIL"),
            TestStatus::Skip => write!(f, "SKIP"),
            TestStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a single test case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub suite: String,
    pub class_name: String,
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    /// Failure body, e.g. the output diff
    pub details: Option<String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    #[serde(default)]
    pub timed_out: bool,
}

impl TestResult {
    fn base(suite: &TestSuite, case: &TestCase, status: TestStatus) -> Self {
        Self {
            suite: suite.name.clone(),
            class_name: suite.class_name().to_string(),
            name: case.name.clone(),
            status,
            duration_ms: 0,
            message: None,
            details: None,
            stdout_path: None,
            stderr_path: None,
            timed_out: false,
        }
    }

    pub fn pass(suite: &TestSuite, case: &TestCase, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..Self::base(suite, case, TestStatus::Pass)
        }
    }

    pub fn fail(
        suite: &TestSuite,
        case: &TestCase,
        duration_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            duration_ms,
            message: Some(message.into()),
            ..Self::base(suite, case, TestStatus::Fail)
        }
    }

    pub fn skip(suite: &TestSuite, case: &TestCase, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::base(suite, case, TestStatus::Skip)
        }
    }

    pub fn error(suite: &TestSuite, case: &TestCase, error: impl Into<String>) -> Self {
        Self {
            message: Some(error.into()),
            ..Self::base(suite, case, TestStatus::Error)
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_outputs(mut self, stdout: Option<PathBuf>, stderr: Option<PathBuf>) -> Self {
        self.stdout_path = stdout;
        self.stderr_path = stderr;
        self
    }

    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    /// `suite.name` identifier used in listings and filters
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.suite, self.name)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.qualified_name(),
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Results of one suite, in declaration order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub suite: String,
    pub class_name: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl SuiteSummary {
    pub fn new(
        suite: impl Into<String>,
        class_name: impl Into<String>,
        started_at: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            suite: suite.into(),
            class_name: class_name.into(),
            started_at,
            total: results.len(),
            passed: count(TestStatus::Pass),
            failed: count(TestStatus::Fail),
            skipped: count(TestStatus::Skip),
            errors: count(TestStatus::Error),
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
            results,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let ran = self.total - self.skipped;
        if ran == 0 {
            0.0
        } else {
            (self.passed as f64 / ran as f64) * 100.0
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Results of a whole engine run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub suites: Vec<SuiteSummary>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    /// Run stopped by keyboard interrupt
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(suites: Vec<SuiteSummary>, interrupted: bool) -> Self {
        Self {
            total: suites.iter().map(|s| s.total).sum(),
            passed: suites.iter().map(|s| s.passed).sum(),
            failed: suites.iter().map(|s| s.failed).sum(),
            skipped: suites.iter().map(|s| s.skipped).sum(),
            errors: suites.iter().map(|s| s.errors).sum(),
            total_duration_ms: suites.iter().map(|s| s.total_duration_ms).sum(),
            suites,
            interrupted,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let ran = self.total - self.skipped;
        if ran == 0 {
            0.0
        } else {
            (self.passed as f64 / ran as f64) * 100.0
        }
    }

    pub fn is_success(&self) -> bool {
        !self.interrupted && self.failed == 0 && self.errors == 0
    }

    /// Every failed or errored result across suites
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.suites
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| r.status.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> TestSuite {
        TestSuite {
            name: "demo".to_string(),
            class_name: Some("DemoTests".to_string()),
            requires_elements: Vec::new(),
            defaults: Default::default(),
            cases: vec![
                TestCase::new("a", "a.py"),
                TestCase::new("b", "b.py"),
                TestCase::new("c", "c.py"),
                TestCase::new("d", "d.py"),
            ],
            path: PathBuf::from("testsuite_default_demo.yaml"),
            test_type: "default".to_string(),
        }
    }

    #[test]
    fn test_result_creation() {
        let suite = suite();
        let result = TestResult::pass(&suite, &suite.cases[0], 100);
        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(result.to_string(), "✓ demo.a [100ms]");
        assert_eq!(result.duration_ms, 100);
        assert_eq!(result.class_name, "DemoTests");
        assert_eq!(result.qualified_name(), "demo.a");
    }

    #[test]
    fn test_status_failure_classes() {
        assert!(TestStatus::Fail.is_failure());
        assert!(TestStatus::Error.is_failure());
        assert!(!TestStatus::Skip.is_failure());
        assert!(!TestStatus::Pass.is_failure());
    }

    #[test]
    fn test_suite_summary_counts() {
        let suite = suite();
        let results = vec![
            TestResult::pass(&suite, &suite.cases[0], 100),
            TestResult::fail(&suite, &suite.cases[1], 50, "output mismatch"),
            TestResult::skip(&suite, &suite.cases[2], "scenario multi_rank"),
            TestResult::error(&suite, &suite.cases[3], "reference missing"),
        ];

        let summary = SuiteSummary::new("demo", "DemoTests", Utc::now(), results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_duration_ms, 150);
        assert!(!summary.is_success());
        assert!((summary.pass_rate() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_run_summary_totals() {
        let suite = suite();
        let first = SuiteSummary::new(
            "demo",
            "DemoTests",
            Utc::now(),
            vec![TestResult::pass(&suite, &suite.cases[0], 10)],
        );
        let second = SuiteSummary::new(
            "demo",
            "DemoTests",
            Utc::now(),
            vec![TestResult::fail(&suite, &suite.cases[1], 20, "timed out")],
        );

        let run = RunSummary::new(vec![first, second], false);
        assert_eq!(run.total, 2);
        assert_eq!(run.passed, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.failures().count(), 1);
        assert!(!run.is_success());
    }

    #[test]
    fn test_interrupted_run_is_not_success() {
        let run = RunSummary::new(Vec::new(), true);
        assert!(!run.is_success());
        assert_eq!(run.pass_rate(), 0.0);
    }
}
