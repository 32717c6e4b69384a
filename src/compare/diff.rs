//! Output comparison against reference files

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::filter::FilterSet;

/// Differences listed in a failure body
const MAX_LISTED_DIFFERENCES: usize = 20;

/// How simulator output is judged against its reference
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Line-by-line equality
    Exact,
    /// Equality after sorting both sides
    Sorted,
    /// Equality after running line filters on both sides
    Filtered,
    /// No reference comparison
    None,
}

/// One differing line position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineDiff {
    /// 1-based line number after normalization
    pub line: usize,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Outcome of comparing output to a reference
#[derive(Clone, Debug, Default)]
pub struct Comparison {
    pub differences: Vec<LineDiff>,
    pub total_differences: usize,
    pub expected_lines: usize,
    pub actual_lines: usize,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.total_differences == 0
    }

    /// `-expected` / `+actual` listing of the first differences
    pub fn render(&self) -> String {
        let mut out = String::new();
        for diff in &self.differences {
            writeln!(out, "@@ line {} @@", diff.line).ok();
            if let Some(expected) = &diff.expected {
                writeln!(out, "-{expected}").ok();
            }
            if let Some(actual) = &diff.actual {
                writeln!(out, "+{actual}").ok();
            }
        }
        if self.total_differences > self.differences.len() {
            writeln!(
                out,
                "... {} more differing lines",
                self.total_differences - self.differences.len()
            )
            .ok();
        }
        out
    }
}

/// Compare actual output to expected output
pub fn compare_output(
    mode: CompareMode,
    filters: &FilterSet,
    actual: &str,
    expected: &str,
) -> Comparison {
    let (actual, expected) = match mode {
        CompareMode::None => return Comparison::default(),
        CompareMode::Exact => (normalize(actual), normalize(expected)),
        CompareMode::Sorted => {
            let mut a = normalize(actual);
            let mut e = normalize(expected);
            a.sort();
            e.sort();
            (a, e)
        }
        CompareMode::Filtered => (filters.apply(actual), filters.apply(expected)),
    };

    diff_lines(&actual, &expected)
}

/// Trailing whitespace and trailing blank lines are not significant
fn normalize(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

fn diff_lines(actual: &[String], expected: &[String]) -> Comparison {
    let mut comparison = Comparison {
        expected_lines: expected.len(),
        actual_lines: actual.len(),
        ..Default::default()
    };

    let len = actual.len().max(expected.len());
    for i in 0..len {
        let a = actual.get(i);
        let e = expected.get(i);
        if a == e {
            continue;
        }

        comparison.total_differences += 1;
        if comparison.differences.len() < MAX_LISTED_DIFFERENCES {
            comparison.differences.push(LineDiff {
                line: i + 1,
                expected: e.cloned(),
                actual: a.cloned(),
            });
        }
    }

    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::LineFilter;

    #[test]
    fn test_exact_ignores_trailing_whitespace() {
        let c = compare_output(
            CompareMode::Exact,
            &FilterSet::empty(),
            "a  \nb\n\n",
            "a\nb",
        );
        assert!(c.matches());
    }

    #[test]
    fn test_exact_reports_differences() {
        let c = compare_output(CompareMode::Exact, &FilterSet::empty(), "a\nx\nc\n", "a\nb\n");
        assert!(!c.matches());
        assert_eq!(c.total_differences, 2);
        assert_eq!(c.differences[0].line, 2);
        assert_eq!(c.differences[0].expected.as_deref(), Some("b"));
        assert_eq!(c.differences[1].expected, None);

        let rendered = c.render();
        assert!(rendered.contains("-b"));
        assert!(rendered.contains("+x"));
        assert!(rendered.contains("+c"));
    }

    #[test]
    fn test_sorted_ignores_order() {
        let c = compare_output(
            CompareMode::Sorted,
            &FilterSet::empty(),
            "rank 1 done\nrank 0 done\n",
            "rank 0 done\nrank 1 done\n",
        );
        assert!(c.matches());
    }

    #[test]
    fn test_filtered_applies_to_both_sides() {
        let filters = FilterSet::new(&[LineFilter::StartsWith("Time:".to_string())]).unwrap();
        let c = compare_output(
            CompareMode::Filtered,
            &filters,
            "Time: 12s\nvalue 4\n",
            "Time: 9s\nvalue 4\n",
        );
        assert!(c.matches());
    }

    #[test]
    fn test_none_always_matches() {
        let c = compare_output(CompareMode::None, &FilterSet::empty(), "x", "y");
        assert!(c.matches());
    }

    #[test]
    fn test_listing_is_capped() {
        let actual: String = (0..30).map(|i| format!("a{i}\n")).collect();
        let expected: String = (0..30).map(|i| format!("b{i}\n")).collect();
        let c = compare_output(CompareMode::Exact, &FilterSet::empty(), &actual, &expected);
        assert_eq!(c.total_differences, 30);
        assert_eq!(c.differences.len(), MAX_LISTED_DIFFERENCES);
        assert!(c.render().contains("... 10 more differing lines"));
    }
}
