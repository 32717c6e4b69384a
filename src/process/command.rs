//! Simulator command line construction

use std::fmt;
use std::path::PathBuf;

use crate::config::EngineConfig;

/// Command line for one simulator run, optionally under an MPI launcher
#[derive(Clone, Debug)]
pub struct SimCommand {
    sst_path: String,
    mpirun_path: String,
    oversubscribe: bool,
    ranks: u32,
    threads: u32,
    args: Vec<String>,
    model_options: Option<String>,
    model: PathBuf,
}

impl SimCommand {
    /// Create a command for a model with the simulator defaults
    pub fn new(sst_path: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            sst_path: sst_path.into(),
            mpirun_path: "mpirun".to_string(),
            oversubscribe: false,
            ranks: 1,
            threads: 1,
            args: Vec::new(),
            model_options: None,
            model: model.into(),
        }
    }

    /// Create a command using the engine's simulator, launcher, ranks, and threads
    pub fn from_config(config: &EngineConfig, model: impl Into<PathBuf>) -> Self {
        Self::new(config.sst_path.clone(), model)
            .mpirun(config.mpirun_path.clone(), config.mpi_oversubscribe)
            .ranks(config.ranks)
            .threads(config.threads)
    }

    pub fn mpirun(mut self, path: impl Into<String>, oversubscribe: bool) -> Self {
        self.mpirun_path = path.into();
        self.oversubscribe = oversubscribe;
        self
    }

    pub fn ranks(mut self, ranks: u32) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn model_options(mut self, options: Option<String>) -> Self {
        self.model_options = options;
        self
    }

    /// Program to execute
    pub fn program(&self) -> &str {
        if self.ranks > 1 {
            &self.mpirun_path
        } else {
            &self.sst_path
        }
    }

    /// Arguments following the program
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();

        if self.ranks > 1 {
            argv.push("-np".to_string());
            argv.push(self.ranks.to_string());
            if self.oversubscribe {
                argv.push("--oversubscribe".to_string());
            }
            argv.push(self.sst_path.clone());
        }

        if self.threads > 1 {
            argv.push("--num-threads".to_string());
            argv.push(self.threads.to_string());
        }

        argv.extend(self.args.iter().cloned());

        if let Some(options) = &self.model_options {
            argv.push("--model-options".to_string());
            argv.push(options.clone());
        }

        argv.push(self.model.to_string_lossy().to_string());
        argv
    }
}

impl fmt::Display for SimCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program())?;
        for arg in self.argv() {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}
