//! JUnit XML reports
//!
//! One `<testsuites>` document per suite, written to `<junit_dir>/<suite>.xml`.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{RunSummary, SuiteSummary, TestResult, TestStatus};
use crate::utils::file_safe;

/// Captured output embedded per test case
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Writes JUnit reports for a run
pub struct JunitWriter {
    dir: PathBuf,
    hostname: String,
}

impl JunitWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            hostname: local_hostname(),
        }
    }

    /// Write one file per suite
    pub fn write_run(&self, summary: &RunSummary) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let paths = summary
            .suites
            .iter()
            .map(|suite| self.write_suite(suite))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Wrote {} JUnit reports to {}",
            paths.len(),
            self.dir.display()
        );
        Ok(paths)
    }

    pub fn write_suite(&self, suite: &SuiteSummary) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.xml", file_safe(&suite.suite)));
        fs::write(&path, render_suite(suite, &self.hostname))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Render a suite as a JUnit document
pub fn render_suite(suite: &SuiteSummary, hostname: &str) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<testsuites>\n");
    let _ = writeln!(
        xml,
        r#"  <testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}" time="{}" timestamp="{}" hostname="{}">"#,
        escape(&suite.suite),
        suite.total,
        suite.failed,
        suite.errors,
        suite.skipped,
        seconds(suite.total_duration_ms),
        suite.started_at.format("%Y-%m-%dT%H:%M:%S"),
        escape(hostname)
    );

    for result in &suite.results {
        render_case(&mut xml, result);
    }

    xml.push_str("  </testsuite>\n");
    xml.push_str("</testsuites>\n");
    xml
}

fn render_case(xml: &mut String, result: &TestResult) {
    let _ = write!(
        xml,
        r#"    <testcase name="{}" classname="{}" time="{}""#,
        escape(&result.name),
        escape(&result.class_name),
        seconds(result.duration_ms)
    );

    let message = result.message.as_deref().unwrap_or_default();
    let body = match result.status {
        TestStatus::Pass => None,
        TestStatus::Skip => Some(format!(
            r#"      <skipped message="{}"/>"#,
            escape(message)
        )),
        TestStatus::Fail | TestStatus::Error => {
            let (tag, kind) = match (result.status, result.timed_out) {
                (TestStatus::Error, _) => ("error", "error"),
                (_, true) => ("failure", "timeout"),
                _ => ("failure", "failure"),
            };
            let mut element = format!(
                r#"      <{tag} message="{}" type="{kind}""#,
                escape(message)
            );
            match &result.details {
                Some(details) => {
                    let _ = write!(element, ">{}</{tag}>", escape(details));
                }
                None => element.push_str("/>"),
            }
            Some(element)
        }
    };

    let stdout = result.stdout_path.as_deref().and_then(read_tail);
    let stderr = result.stderr_path.as_deref().and_then(read_tail);

    if body.is_none() && stdout.is_none() && stderr.is_none() {
        xml.push_str("/>\n");
        return;
    }

    xml.push_str(">\n");
    if let Some(body) = body {
        xml.push_str(&body);
        xml.push('\n');
    }
    if let Some(out) = stdout {
        let _ = writeln!(xml, "      <system-out>{}</system-out>", escape(&out));
    }
    if let Some(err) = stderr {
        let _ = writeln!(xml, "      <system-err>{}</system-err>", escape(&err));
    }
    xml.push_str("    </testcase>\n");
}

/// Last `MAX_CAPTURE_BYTES` of a captured output file
fn read_tail(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let start = bytes.len().saturating_sub(MAX_CAPTURE_BYTES);
    Some(String::from_utf8_lossy(&bytes[start..]).into_owned())
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Escape XML special characters and drop characters XML 1.0 forbids
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < ' ' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn local_hostname() -> String {
    #[cfg(unix)]
    if let Ok(name) = nix::unistd::gethostname() {
        return name.to_string_lossy().into_owned();
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
