//! Environment variable configuration
//!
//! Provides `SST_TEST_*` environment variable overrides.

use std::env;
use std::path::PathBuf;

use super::EngineConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "SST_TEST";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Simulator binary from SST_TEST_SST_PATH
    pub sst_path: Option<String>,
    /// MPI launcher from SST_TEST_MPIRUN
    pub mpirun_path: Option<String>,
    /// Ranks from SST_TEST_RANKS
    pub ranks: Option<u32>,
    /// Threads from SST_TEST_THREADS
    pub threads: Option<u32>,
    /// Concurrency from SST_TEST_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Default timeout from SST_TEST_TIMEOUT
    pub timeout: Option<u64>,
    /// Timeout override from SST_TEST_TIMEOUT_OVERRIDE
    pub timeout_override: Option<u64>,
    /// Output directory from SST_TEST_OUTPUT_DIR
    pub output_dir: Option<PathBuf>,
    /// Scenarios from SST_TEST_SCENARIOS (comma separated)
    pub scenarios: Option<Vec<String>>,
    /// Config file from SST_TEST_CONFIG
    pub config_file: Option<PathBuf>,
    /// Verbose from SST_TEST_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            sst_path: get_env("SST_PATH"),
            mpirun_path: get_env("MPIRUN"),
            ranks: get_env_parse("RANKS"),
            threads: get_env_parse("THREADS"),
            concurrency: get_env_parse("CONCURRENCY"),
            timeout: get_env_parse("TIMEOUT"),
            timeout_override: get_env_parse("TIMEOUT_OVERRIDE"),
            output_dir: get_env("OUTPUT_DIR").map(PathBuf::from),
            scenarios: get_env("SCENARIOS").map(|v| split_list(&v)),
            config_file: get_env("CONFIG").map(PathBuf::from),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.sst_path.is_some()
            || self.mpirun_path.is_some()
            || self.ranks.is_some()
            || self.threads.is_some()
            || self.concurrency.is_some()
            || self.timeout.is_some()
            || self.timeout_override.is_some()
            || self.output_dir.is_some()
            || self.scenarios.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
    }

    /// Overlay the set variables onto a configuration
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(v) = &self.sst_path {
            config.sst_path = v.clone();
        }
        if let Some(v) = &self.mpirun_path {
            config.mpirun_path = v.clone();
        }
        if let Some(v) = self.ranks {
            config.ranks = v;
        }
        if let Some(v) = self.threads {
            config.threads = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.timeout {
            config.timeout_secs = v;
        }
        if let Some(v) = self.timeout_override {
            config.timeout_override = Some(v);
        }
        if let Some(v) = &self.output_dir {
            config.output_dir = v.clone();
        }
        if let Some(scenarios) = &self.scenarios {
            for scenario in scenarios {
                if !config.is_scenario_active(scenario) {
                    config.scenarios.push(scenario.clone());
                }
            }
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_SST_PATH:          {:?}", ENV_PREFIX, self.sst_path);
        println!("  {}_MPIRUN:            {:?}", ENV_PREFIX, self.mpirun_path);
        println!("  {}_RANKS:             {:?}", ENV_PREFIX, self.ranks);
        println!("  {}_THREADS:           {:?}", ENV_PREFIX, self.threads);
        println!("  {}_CONCURRENCY:       {:?}", ENV_PREFIX, self.concurrency);
        println!("  {}_TIMEOUT:           {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_TIMEOUT_OVERRIDE:  {:?}", ENV_PREFIX, self.timeout_override);
        println!("  {}_OUTPUT_DIR:        {:?}", ENV_PREFIX, self.output_dir);
        println!("  {}_SCENARIOS:         {:?}", ENV_PREFIX, self.scenarios);
        println!("  {}_CONFIG:            {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_VERBOSE:           {:?}", ENV_PREFIX, self.verbose);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Print all SST_TEST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_SST_PATH          Simulator binary (default: sst)");
    println!("  {ENV_PREFIX}_MPIRUN            MPI launcher (default: mpirun)");
    println!("  {ENV_PREFIX}_RANKS             MPI ranks per simulation");
    println!("  {ENV_PREFIX}_THREADS           Threads per rank");
    println!("  {ENV_PREFIX}_CONCURRENCY       Tests run concurrently");
    println!("  {ENV_PREFIX}_TIMEOUT           Default per-test timeout in seconds");
    println!("  {ENV_PREFIX}_TIMEOUT_OVERRIDE  Timeout applied to every test");
    println!("  {ENV_PREFIX}_OUTPUT_DIR        Output directory");
    println!("  {ENV_PREFIX}_SCENARIOS         Active scenarios (comma separated)");
    println!("  {ENV_PREFIX}_CONFIG            Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE           Enable verbose output (true/false)");
    println!("  SST_CONFIG_FILE            Path to sstsimulator.conf");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_CONCURRENCY=8");
    println!("  export {ENV_PREFIX}_SCENARIOS=multi_rank,no_mpi");
    println!("  sst-test-engine run -p tests");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.sst_path.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_load() {
        env::set_var("SST_TEST_THREADS", "4");
        env::set_var("SST_TEST_SCENARIOS", "multi_rank, no_mpi,");
        env::set_var("SST_TEST_VERBOSE", "yes");

        let config = EnvConfig::load();

        env::remove_var("SST_TEST_THREADS");
        env::remove_var("SST_TEST_SCENARIOS");
        env::remove_var("SST_TEST_VERBOSE");

        assert_eq!(config.threads, Some(4));
        assert_eq!(
            config.scenarios,
            Some(vec!["multi_rank".to_string(), "no_mpi".to_string()])
        );
        assert_eq!(config.verbose, Some(true));
        assert!(config.has_any());
    }

    #[test]
    fn test_apply_to() {
        let env = EnvConfig {
            ranks: Some(4),
            timeout_override: Some(900),
            scenarios: Some(vec!["multi_rank".to_string()]),
            ..Default::default()
        };
        let mut config = EngineConfig::default().with_scenario("multi_rank");
        env.apply_to(&mut config);

        assert_eq!(config.ranks, 4);
        assert_eq!(config.timeout_override, Some(900));
        assert_eq!(config.scenarios.len(), 1);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a,,b , c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
