// src/cli.rs

use crate::api::{self, PoolError, DEFAULT_BATCH_SIZE};
use crate::data_types::{GpuSettings, PoolContext, SessionPolicy, SolverConfig};
use crate::solver::{DEFAULT_GRID_SIZE, DEFAULT_SOLVER_PATH};
use clap::{Parser, Subcommand};
use pool_keysearch_lib::handoff::{DEFAULT_INPUT_FILE, DEFAULT_OUTPUT_FILE};
use pool_keysearch_lib::is_valid_address;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Endpoint of the coordinating service (GET for work, POST for keys).
    #[arg(long, env = "POOL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Token sent in the `pool-token` header of every request.
    #[arg(long, env = "POOL_TOKEN", global = true, hide_env_values = true)]
    pub pool_token: Option<String>,

    /// Canary address appended to every solver input.
    #[arg(long, env = "POOL_SENTINEL_ADDRESS")]
    pub sentinel_address: Option<String>,

    /// Number of private keys per submitted batch. Shorter trailing batches are dropped.
    #[arg(long, env = "POOL_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Seconds to wait before retrying a failed cycle.
    #[arg(long, env = "POOL_SLEEP_SECS", default_value_t = 10)]
    pub sleep_secs: u64,

    /// Consecutive failed cycles tolerated before giving up.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Attempts per work request before the fetch counts as failed.
    #[arg(long, default_value_t = 3, global = true)]
    pub fetch_attempts: u32,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 30, global = true)]
    pub request_timeout_secs: u64,

    /// Path to the external solver executable.
    #[arg(long, env = "POOL_SOLVER_PATH", default_value = DEFAULT_SOLVER_PATH)]
    pub solver_path: PathBuf,

    /// CPU thread count passed to the solver.
    #[arg(long, default_value_t = 0)]
    pub threads: u32,

    /// Run the solver without GPU acceleration.
    #[arg(long)]
    pub cpu_only: bool,

    #[arg(long, default_value_t = 0)]
    pub gpu_id: u32,

    #[arg(long, default_value = DEFAULT_GRID_SIZE)]
    pub grid_size: String,

    /// Address list handed to the solver.
    #[arg(long, default_value = DEFAULT_INPUT_FILE)]
    pub input_file: PathBuf,

    /// File the solver writes found keys to.
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Do not clear the terminal at the start of each cycle.
    #[arg(long)]
    pub no_clear: bool,

    /// Keep requesting work after a unit is submitted instead of exiting.
    #[arg(long)]
    pub continuous: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Runs the fetch → solve → submit loop (the default).
    Run,

    /// Fetches one work unit and prints it without solving it.
    Work {
        /// Make a single request instead of retrying with backoff.
        #[arg(long)]
        no_retry: bool,
    },

    /// Checks whether an address is well formed.
    CheckAddress {
        address: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing --{flag} (or {env})")]
    Missing { flag: &'static str, env: &'static str },

    #[error("sentinel address {0} is not a valid pool address")]
    InvalidSentinel(String),

    #[error("--batch-size must be at least 1")]
    ZeroBatchSize,

    #[error("could not build HTTP client: {0}")]
    Client(#[from] PoolError),
}

impl Cli {
    pub fn pool_context(&self) -> Result<PoolContext, ConfigError> {
        let api_url = self
            .api_url
            .clone()
            .ok_or(ConfigError::Missing { flag: "api-url", env: "POOL_API_URL" })?;
        let pool_token = self
            .pool_token
            .clone()
            .ok_or(ConfigError::Missing { flag: "pool-token", env: "POOL_TOKEN" })?;
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        Ok(PoolContext {
            client: api::build_client(Duration::from_secs(self.request_timeout_secs))?,
            api_url,
            pool_token,
            fetch_attempts: self.fetch_attempts,
            batch_size: self.batch_size,
        })
    }

    pub fn sentinel(&self) -> Result<String, ConfigError> {
        let sentinel = self
            .sentinel_address
            .as_deref()
            .map(str::trim)
            .ok_or(ConfigError::Missing { flag: "sentinel-address", env: "POOL_SENTINEL_ADDRESS" })?;
        if !is_valid_address(sentinel) {
            return Err(ConfigError::InvalidSentinel(sentinel.to_string()));
        }
        Ok(sentinel.to_string())
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            binary: self.solver_path.clone(),
            threads: self.threads,
            gpu: (!self.cpu_only).then(|| GpuSettings { gpu_id: self.gpu_id, grid_size: self.grid_size.clone() }),
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            max_retries: self.max_retries,
            retry_sleep: Duration::from_secs(self.sleep_secs),
            continuous: self.continuous,
        }
    }
}
