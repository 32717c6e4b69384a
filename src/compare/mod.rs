//! Output comparison
//!
//! Normalizes simulator output and reference files and reports the lines
//! that differ.

mod diff;
mod filter;

pub use diff::{compare_output, CompareMode};
pub use filter::{FilterSet, LineFilter};
