//! Data models for the test engine
//!
//! Suite and case definitions as loaded from suite files, and the results
//! produced by running them.

mod suite;
mod test_result;

pub use suite::{TestCase, TestSuite};
pub use test_result::{RunSummary, SuiteSummary, TestResult, TestStatus};
