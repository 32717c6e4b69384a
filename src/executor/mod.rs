//! Test execution engine
//!
//! Runs cases through the simulator with bounded concurrency and forwards
//! results through a serialized sink.

mod parallel;
mod runner;
mod sink;

pub use parallel::ParallelExecutor;
pub use runner::TestRunner;
pub use sink::ResultSink;
