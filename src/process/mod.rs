//! Simulator process management
//!
//! Builds simulator command lines and runs them under a wall-clock timeout.

mod command;
mod subprocess;

pub use command::SimCommand;
pub use subprocess::{run_with_timeout, ProcessIo};
