//! Output formatters for test results
//!
//! Provides per-test progress lines and run summaries in table, JSON, and
//! brief formats.

use serde::Serialize;
use std::path::PathBuf;

use crate::models::{RunSummary, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    /// Whether per-test progress lines go to the console
    pub fn streams_progress(&self) -> bool {
        matches!(self, OutputFormat::Table | OutputFormat::Summary)
    }
}

/// One row of `list` output
#[derive(Clone, Debug, Serialize)]
pub struct CaseListing {
    pub suite: String,
    pub test_type: String,
    pub name: String,
    pub model: PathBuf,
    pub skip: Option<String>,
}

/// Result formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    /// Create a formatter; color is off when `NO_COLOR` is set
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.colorize {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        match status {
            TestStatus::Pass => self.paint("32", &label),
            TestStatus::Fail | TestStatus::Error => self.paint("31", &label),
            TestStatus::Skip => self.paint("33", &label),
        }
    }

    /// Progress line printed as each test completes
    pub fn format_progress(&self, result: &TestResult, done: usize, total: usize) -> String {
        let width = total.to_string().len();
        let mut line = format!(
            "[{done:>width$}/{total}] {} {} ({}ms)",
            self.status_label(result.status),
            result.qualified_name(),
            result.duration_ms
        );
        if result.status != TestStatus::Pass {
            if let Some(message) = &result.message {
                line.push_str(" - ");
                line.push_str(message);
            }
        }
        line
    }

    /// Detail block printed under a failed or errored test
    pub fn format_failure(&self, result: &TestResult) -> Option<String> {
        if !result.status.is_failure() || self.format == OutputFormat::Summary {
            return None;
        }

        let mut out = String::new();
        if let Some(details) = &result.details {
            for line in details.lines() {
                let line = match line.chars().next() {
                    Some('-') => self.paint("31", line),
                    Some('+') => self.paint("32", line),
                    _ => line.to_string(),
                };
                out.push_str("    ");
                out.push_str(&line);
                out.push('\n');
            }
        }
        if let Some(stdout) = &result.stdout_path {
            out.push_str(&format!("    stdout: {}\n", stdout.display()));
        }
        if let Some(stderr) = &result.stderr_path {
            out.push_str(&format!("    stderr: {}\n", stderr.display()));
        }

        if out.is_empty() {
            None
        } else {
            Some(out.trim_end().to_string())
        }
    }

    /// Format the final run summary
    pub fn format_run(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_run_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Summary => self.format_run_brief(summary),
        }
    }

    fn format_run_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str(
            "\n┌──────────────────────────────────┬───────┬───────┬───────┬───────┬───────┬────────┬────────────┐\n",
        );
        output.push_str(
            "│ Suite                            │ Total │ Pass  │ Fail  │ Skip  │ Error │ Rate   │ Duration   │\n",
        );
        output.push_str(
            "├──────────────────────────────────┼───────┼───────┼───────┼───────┼───────┼────────┼────────────┤\n",
        );

        for suite in &summary.suites {
            let name = format!("{:32}", truncate(&suite.suite, 32));
            let name = if suite.is_success() {
                name
            } else {
                self.paint("31", &name)
            };
            let rate = format!("{:5.1}%", suite.pass_rate());
            output.push_str(&format!(
                "│ {} │ {:5} │ {:5} │ {:5} │ {:5} │ {:5} │ {} │ {:>8}ms │\n",
                name,
                suite.total,
                suite.passed,
                suite.failed,
                suite.skipped,
                suite.errors,
                rate,
                suite.total_duration_ms
            ));
        }

        output.push_str(
            "└──────────────────────────────────┴───────┴───────┴───────┴───────┴───────┴────────┴────────────┘\n",
        );

        let failures: Vec<_> = summary.failures().collect();
        if !failures.is_empty() {
            output.push_str("\nFailed tests:\n");
            for result in failures {
                output.push_str(&format!(
                    "  {} {}",
                    self.status_label(result.status),
                    result.qualified_name()
                ));
                if let Some(message) = &result.message {
                    output.push_str(&format!(" - {message}"));
                }
                output.push('\n');
            }
        }

        output.push('\n');
        output.push_str(&self.format_run_brief(summary));
        output.push('\n');
        output
    }

    fn format_run_brief(&self, summary: &RunSummary) -> String {
        let verdict = if summary.interrupted {
            self.paint("33", "INTERRUPTED")
        } else if summary.is_success() {
            self.paint("32", "PASSED")
        } else {
            self.paint("31", "FAILED")
        };

        format!(
            "{}: {} tests, {} passed, {} failed, {} errors, {} skipped ({:.1}%) in {}ms",
            verdict,
            summary.total,
            summary.passed,
            summary.failed,
            summary.errors,
            summary.skipped,
            summary.pass_rate(),
            summary.total_duration_ms
        )
    }

    /// Format the output of `list`
    pub fn format_listing(&self, cases: &[CaseListing]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(cases).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(cases).unwrap_or_default(),
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::new();
                let mut current = None;
                for case in cases {
                    if current != Some(&case.suite) {
                        output.push_str(&format!("{} [{}]\n", case.suite, case.test_type));
                        current = Some(&case.suite);
                    }
                    match &case.skip {
                        Some(reason) => output.push_str(&format!(
                            "  {} {} ({})\n",
                            self.paint("33", "○"),
                            case.name,
                            reason
                        )),
                        None => output.push_str(&format!(
                            "  - {} [{}]\n",
                            case.name,
                            case.model.display()
                        )),
                    }
                }
                output.push_str(&format!("\n{} tests\n", cases.len()));
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max - 1).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SuiteSummary, TestCase, TestSuite};
    use chrono::Utc;

    fn suite() -> TestSuite {
        TestSuite {
            name: "memh".to_string(),
            class_name: None,
            requires_elements: Vec::new(),
            defaults: Default::default(),
            cases: Vec::new(),
            path: PathBuf::from("testsuite_default_memh.yaml"),
            test_type: "default".to_string(),
        }
    }

    fn summary() -> RunSummary {
        let suite = suite();
        let results = vec![
            TestResult::pass(&suite, &TestCase::new("a", "a.py"), 12),
            TestResult::fail(&suite, &TestCase::new("b", "b.py"), 30, "output differs")
                .with_details("@@ line 1 @@\n-expected\n+actual"),
            TestResult::skip(&suite, &TestCase::new("c", "c.py"), "no mpi"),
        ];
        RunSummary::new(
            vec![SuiteSummary::new("memh", "memh", Utc::now(), results)],
            false,
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(
            OutputFormat::from_str("json-pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("csv"), None);
        assert!(OutputFormat::Summary.streams_progress());
        assert!(!OutputFormat::Json.streams_progress());
    }

    #[test]
    fn test_progress_line() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let summary = summary();
        let failed = &summary.suites[0].results[1];

        let line = formatter.format_progress(failed, 2, 12);
        assert_eq!(line, "[ 2/12] ✗ FAIL memh.b (30ms) - output differs");

        let passed = &summary.suites[0].results[0];
        assert_eq!(
            formatter.format_progress(passed, 1, 3),
            "[1/3] ✓ PASS memh.a (12ms)"
        );
    }

    #[test]
    fn test_failure_details() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let summary = summary();

        let details = formatter
            .format_failure(&summary.suites[0].results[1])
            .unwrap();
        assert!(details.contains("    -expected"));
        assert!(formatter
            .format_failure(&summary.suites[0].results[0])
            .is_none());
    }

    #[test]
    fn test_run_table_and_brief() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let table = formatter.format_run(&summary());
        assert!(table.contains("│ memh"));
        assert!(table.contains("│  50.0% │"));
        assert!(table.contains("Failed tests:"));
        assert!(table.contains("FAILED: 3 tests, 1 passed, 1 failed, 0 errors, 1 skipped (50.0%)"));
    }

    #[test]
    fn test_run_json() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let json = formatter.format_run(&summary());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["suites"][0]["results"][1]["status"], "fail");
    }

    #[test]
    fn test_listing() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let cases = vec![
            CaseListing {
                suite: "memh".to_string(),
                test_type: "default".to_string(),
                name: "a".to_string(),
                model: PathBuf::from("a.py"),
                skip: None,
            },
            CaseListing {
                suite: "memh".to_string(),
                test_type: "default".to_string(),
                name: "b".to_string(),
                model: PathBuf::from("b.py"),
                skip: Some("no mpi".to_string()),
            },
        ];
        let text = formatter.format_listing(&cases);
        assert!(text.starts_with("memh [default]\n  - a [a.py]\n  ○ b (no mpi)\n"));
        assert!(text.ends_with("2 tests\n"));
    }
}
