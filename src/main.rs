// src/main.rs

mod api;
mod cli;
mod controller;
mod data_types;
mod solver;
mod utils;

use clap::Parser;
use cli::{Cli, Commands};
use controller::{run_session, PoolWorker, SessionEnd};
use pool_keysearch_lib::is_valid_address;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_ERROR: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, shutdown: Arc<AtomicBool>) -> ExitCode {
    let (pool, sentinel) = match cli.pool_context().and_then(|pool| Ok((pool, cli.sentinel()?))) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let solver = cli.solver_config();
    let policy = cli.session_policy();
    utils::print_session_setup(&pool, &solver, &policy, &sentinel);

    let mut worker = PoolWorker {
        pool: &pool,
        solver,
        sentinel,
        clear_screen: !cli.no_clear,
        shutdown: Arc::clone(&shutdown),
    };

    match run_session(&mut worker, &policy, &shutdown, |delay| utils::pause(&shutdown, delay)) {
        SessionEnd::Completed { sentinel_key: Some(key) } => {
            println!("\n✅ Sentinel key found, the solver is working. Stopping.");
            println!("Sentinel key: {}", key);
            ExitCode::SUCCESS
        }
        SessionEnd::Completed { sentinel_key: None } => {
            println!("\n✅ Work unit submitted. Session complete.");
            ExitCode::SUCCESS
        }
        SessionEnd::Interrupted => {
            println!("\n🛑 Stopped by user.");
            ExitCode::SUCCESS
        }
        SessionEnd::Exhausted { retries } => {
            eprintln!("\n❌ Giving up after {} consecutive failed cycles.", retries);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn print_work(cli: &Cli, no_retry: bool, shutdown: &AtomicBool) -> ExitCode {
    let pool = match cli.pool_context() {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let fetched = if no_retry {
        api::fetch_work(&pool)
    } else {
        api::fetch_work_with_retry(&pool, |delay| utils::pause(shutdown, delay))
    };
    let work = match fetched {
        Ok(work) => work,
        Err(e) => {
            error!(error = %e, transport = e.is_transport(), "Could not fetch a work unit");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    match serde_json::to_string_pretty(&work) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Could not render work unit");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_sig = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received, finishing current step");
        shutdown_sig.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Could not install Ctrl+C handler");
    }

    match &cli.command {
        None | Some(Commands::Run) => run(&cli, shutdown),
        Some(Commands::Work { no_retry }) => print_work(&cli, *no_retry, &shutdown),
        Some(Commands::CheckAddress { address }) => {
            if is_valid_address(address.trim()) {
                println!("✅ {} is a valid pool address", address.trim());
                ExitCode::SUCCESS
            } else {
                println!("❌ {} is not a valid pool address", address.trim());
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}
