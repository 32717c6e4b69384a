//! Test suite discovery
//!
//! Locates suite files under the search paths and loads them into
//! [`TestSuite`](crate::models::TestSuite) values.

mod finder;

pub use finder::{DiscoveryError, SuiteFinder, ALL_TYPES};
