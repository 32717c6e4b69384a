//! Output formatting module
//!
//! Console rendering of progress, run summaries, and suite listings.

mod formatter;

pub use formatter::{CaseListing, OutputFormat, ResultFormatter};
