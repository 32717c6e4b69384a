//! Test suite and test case definitions
//!
//! Suites are declared in `testsuite_<type>_<name>.yaml` files. Each case
//! describes one invocation of the simulator and how to judge its output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::compare::{CompareMode, LineFilter};

/// A suite of test cases loaded from a single file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSuite {
    /// Suite name (defaults to the `<name>` part of the file name)
    #[serde(default)]
    pub name: String,

    /// JUnit classname (defaults to the suite name)
    #[serde(default)]
    pub class_name: Option<String>,

    /// Elements that must be registered in sstsimulator.conf
    #[serde(default)]
    pub requires_elements: Vec<String>,

    /// Defaults applied to every case in the suite
    #[serde(default)]
    pub defaults: CaseDefaults,

    /// Test cases in declaration order
    #[serde(rename = "tests")]
    pub cases: Vec<TestCase>,

    /// File the suite was loaded from
    #[serde(skip)]
    pub path: PathBuf,

    /// Test type from the file name (`default`, `extended`, ...)
    #[serde(skip)]
    pub test_type: String,
}

impl TestSuite {
    /// Directory holding the suite file; models and references resolve against it
    pub fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn class_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(&self.name)
    }

    /// Timeout for a case, before any global override
    pub fn timeout_for(&self, case: &TestCase) -> Option<u64> {
        case.timeout_secs.or(self.defaults.timeout_secs)
    }

    /// Comparison mode for a case
    pub fn compare_mode_for(&self, case: &TestCase) -> CompareMode {
        if let Some(mode) = case.compare.or(self.defaults.compare) {
            return mode;
        }
        match &case.reference {
            None => CompareMode::None,
            Some(_) if self.filters_for(case).is_empty() => CompareMode::Exact,
            Some(_) => CompareMode::Filtered,
        }
    }

    /// Suite-level filters followed by case filters
    pub fn filters_for(&self, case: &TestCase) -> Vec<LineFilter> {
        self.defaults
            .filters
            .iter()
            .chain(case.filters.iter())
            .cloned()
            .collect()
    }

    pub fn max_ranks_for(&self, case: &TestCase) -> Option<u32> {
        case.max_ranks.or(self.defaults.max_ranks)
    }

    pub fn max_threads_for(&self, case: &TestCase) -> Option<u32> {
        case.max_threads.or(self.defaults.max_threads)
    }

    /// Suite and case element requirements combined
    pub fn required_elements_for<'a>(&'a self, case: &'a TestCase) -> impl Iterator<Item = &'a str> {
        self.requires_elements
            .iter()
            .chain(case.requires_elements.iter())
            .map(String::as_str)
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} tests)", self.name, self.cases.len())
    }
}

/// Suite-wide defaults for cases
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CaseDefaults {
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub compare: Option<CompareMode>,

    #[serde(default)]
    pub filters: Vec<LineFilter>,

    #[serde(default)]
    pub max_ranks: Option<u32>,

    #[serde(default)]
    pub max_threads: Option<u32>,
}

/// A single simulator invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    /// Case name, unique inside the suite
    pub name: String,

    /// Model file, relative to the suite directory
    pub model: PathBuf,

    /// Extra simulator arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Value passed through `--model-options`
    #[serde(default)]
    pub model_options: Option<String>,

    /// Reference output, relative to the suite directory
    #[serde(default)]
    pub reference: Option<PathBuf>,

    #[serde(default)]
    pub compare: Option<CompareMode>,

    #[serde(default)]
    pub filters: Vec<LineFilter>,

    /// Text that must appear somewhere in stdout
    #[serde(default)]
    pub expect_contains: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub expect_exit_code: i32,

    /// Unconditional skip with a reason
    #[serde(default)]
    pub skip: Option<String>,

    /// Skip when any of these scenarios is active
    #[serde(default)]
    pub skip_on_scenarios: Vec<String>,

    #[serde(default)]
    pub max_ranks: Option<u32>,

    #[serde(default)]
    pub max_threads: Option<u32>,

    #[serde(default)]
    pub requires_elements: Vec<String>,
}

#[cfg(test)]
impl TestCase {
    pub fn new(name: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            args: Vec::new(),
            model_options: None,
            reference: None,
            compare: None,
            filters: Vec::new(),
            expect_contains: Vec::new(),
            timeout_secs: None,
            expect_exit_code: 0,
            skip: None,
            skip_on_scenarios: Vec::new(),
            max_ranks: None,
            max_threads: None,
            requires_elements: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<PathBuf>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_filter(mut self, filter: LineFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn expect_contains(mut self, text: impl Into<String>) -> Self {
        self.expect_contains.push(text.into());
        self
    }

    pub fn skip_on_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.skip_on_scenarios.push(scenario.into());
        self
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.model.display())
    }
}
