//! Results reporting and storage
//!
//! JUnit XML reports per suite and JSON snapshots of whole runs.

mod junit;
mod storage;

pub use junit::JunitWriter;
pub use storage::{RunStore, StoredRun};
