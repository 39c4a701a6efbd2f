// src/utils.rs

use crate::data_types::{PoolContext, SessionPolicy, SolverConfig};
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const PAUSE_TICK: Duration = Duration::from_millis(100);

pub fn clear_screen() {
    if let Err(e) = Term::stdout().clear_screen() {
        debug!(error = %e, "Terminal does not support clearing");
    }
}

/// Sleeps for `duration` in short ticks. Breaks early once `shutdown` is raised.
pub fn pause(shutdown: &AtomicBool, duration: Duration) -> ControlFlow<()> {
    let deadline = Instant::now() + duration;
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.yellow} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    while !shutdown.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        spinner.set_message(format!("Waiting {}s before retrying...", remaining.as_secs() + 1));
        spinner.tick();
        thread::sleep(remaining.min(PAUSE_TICK));
    }
    spinner.finish_and_clear();

    if shutdown.load(Ordering::SeqCst) {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

pub fn print_session_setup(pool: &PoolContext, solver: &SolverConfig, policy: &SessionPolicy, sentinel: &str) {
    println!("\n==============================================");
    println!("🔑 Pool keysearch: {} mode", if policy.continuous { "CONTINUOUS" } else { "SINGLE UNIT" });
    println!("==============================================");
    println!("API URL:        {}", pool.api_url);
    println!("Solver:         {}", solver.binary.display());
    match &solver.gpu {
        Some(gpu) => println!("Device:         GPU {} (grid {}), {} CPU threads", gpu.gpu_id, gpu.grid_size, solver.threads),
        None => println!("Device:         CPU only, {} threads", solver.threads),
    }
    println!("Handoff files:  {} -> {}", solver.input_file.display(), solver.output_file.display());
    println!("Sentinel:       {}", sentinel);
    println!("Batch size:     {}", pool.batch_size);
    println!("Retry ceiling:  {} (sleep {}s)", policy.max_retries, policy.retry_sleep.as_secs());
    println!("----------------------------------------------");
}
