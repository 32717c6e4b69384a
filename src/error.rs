//! Engine-level errors that decide the process exit code

use std::path::PathBuf;
use thiserror::Error;

use crate::discovery::DiscoveryError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Test run interrupted")]
    Interrupted,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Invalid suite file {path}: {message}")]
    InvalidSuite { path: PathBuf, message: String },
}

impl EngineError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Interrupted => 130,
            EngineError::Discovery(_) | EngineError::InvalidSuite { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EngineError::Interrupted.exit_code(), 130);
        let err = EngineError::InvalidSuite {
            path: PathBuf::from("testsuite_default_x.yaml"),
            message: "bad".to_string(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("testsuite_default_x.yaml"));
    }
}
