// src/solver.rs

use crate::data_types::{KeyRange, SolverConfig};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_SOLVER_PATH: &str = "./vanitysearch";
pub const DEFAULT_GRID_SIZE: &str = "1536";

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("could not start solver {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("solver exited with {0}")]
    Exit(ExitStatus),

    #[error("lost track of solver process: {0}")]
    Wait(#[source] io::Error),

    #[error("solver stopped by user interrupt")]
    Interrupted,
}

/// Command-line arguments for one solver run over `range`.
pub fn solver_args(config: &SolverConfig, range: &KeyRange) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-t".into(), config.threads.to_string().into()];
    if let Some(gpu) = &config.gpu {
        args.extend([
            "-gpu".into(),
            "-gpuId".into(),
            gpu.gpu_id.to_string().into(),
            "-g".into(),
            gpu.grid_size.clone().into(),
        ]);
    }
    args.extend([
        "-i".into(),
        config.input_file.clone().into_os_string(),
        "-o".into(),
        config.output_file.clone().into_os_string(),
        "--keyspace".into(),
        range.keyspace().into(),
    ]);
    args
}

/// Runs the solver over `range` and blocks until it exits.
///
/// The child inherits the terminal so its own progress output stays visible.
/// When `shutdown` is raised the child is killed and reaped before returning;
/// this function never returns while the child is still alive.
pub fn run_solver(config: &SolverConfig, range: &KeyRange, shutdown: &AtomicBool) -> Result<(), SolverError> {
    info!(solver = %config.binary.display(), keyspace = %range.keyspace(), "Starting solver");
    let started = Instant::now();

    let mut child = Command::new(&config.binary)
        .args(solver_args(config, range))
        .spawn()
        .map_err(|source| SolverError::Spawn { path: config.binary.clone(), source })?;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            warn!(pid = child.id(), "Interrupt received, stopping solver");
            // kill fails only when the child has already exited; wait reaps it either way
            let _ = child.kill();
            let _ = child.wait();
            return Err(SolverError::Interrupted);
        }

        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                info!(elapsed_secs = started.elapsed().as_secs(), "Solver finished");
                return Ok(());
            }
            Ok(Some(status)) => return Err(SolverError::Exit(status)),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolverError::Wait(e));
            }
        }
    }
}
