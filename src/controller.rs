// src/controller.rs

use crate::api::{self, PoolError, SubmitSummary};
use crate::data_types::{PoolContext, SessionPolicy, SolverConfig, WorkDescriptor};
use crate::solver::{self, SolverError};
use crate::utils;
use pool_keysearch_lib::{handoff, reconcile, HandoffError, Outcome};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

// ===============================================
// STATES, EVENTS AND TRANSITIONS
// ===============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    Initializing,
    Fetching,
    /// Holds the work unit for exactly one prepare → solve → reconcile → submit pass.
    Processing(WorkDescriptor),
    Error,
    Completed,
}

impl ProgramState {
    pub fn name(&self) -> &'static str {
        match self {
            ProgramState::Initializing => "initializing",
            ProgramState::Fetching => "fetching",
            ProgramState::Processing(_) => "processing",
            ProgramState::Error => "error",
            ProgramState::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgramState::Error | ProgramState::Completed)
    }
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to fetch work unit: {0}")]
    Fetch(#[from] PoolError),

    #[error("failed to prepare solver input: {0}")]
    Prepare(#[from] HandoffError),

    #[error("solver run failed: {0}")]
    Solver(#[from] SolverError),

    #[error("solver returned {found} keys for {expected} targets; discarded")]
    Incomplete { found: usize, expected: usize },

    #[error("could not read solver output: {0}")]
    ParseFailure(String),

    #[error("{failed} of {total} key batches were rejected")]
    Submission { failed: usize, total: usize },
}

/// How a work unit that made it through processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Submitted(SubmitSummary),
    SentinelFound(String),
}

#[derive(Debug)]
pub enum Event {
    Initialized,
    WorkFetched(WorkDescriptor),
    UnitDone(UnitOutcome),
    Fault(CycleError),
}

/// Controller state plus the session-wide count of consecutive faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: ProgramState,
    pub retry_count: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self { state: ProgramState::Initializing, retry_count: 0 }
    }
}

/// The controller's transition function.
///
/// A fault below the retry ceiling sends the session back to `Initializing`;
/// reaching the ceiling ends it in `Error`. Terminal states absorb every event.
pub fn transition(session: Session, event: Event, policy: &SessionPolicy) -> Session {
    let Session { state, retry_count } = session;
    match (state, event) {
        (state, _) if state.is_terminal() => Session { state, retry_count },

        (_, Event::Fault(_)) => {
            let retry_count = retry_count + 1;
            let state = if retry_count >= policy.max_retries {
                ProgramState::Error
            } else {
                ProgramState::Initializing
            };
            Session { state, retry_count }
        }

        (ProgramState::Initializing, Event::Initialized) => Session { state: ProgramState::Fetching, retry_count },

        (ProgramState::Fetching, Event::WorkFetched(work)) => {
            Session { state: ProgramState::Processing(work), retry_count }
        }

        (ProgramState::Processing(_), Event::UnitDone(UnitOutcome::SentinelFound(_))) => {
            Session { state: ProgramState::Completed, retry_count }
        }

        (ProgramState::Processing(_), Event::UnitDone(UnitOutcome::Submitted(_))) => {
            if policy.continuous {
                Session { state: ProgramState::Initializing, retry_count: 0 }
            } else {
                Session { state: ProgramState::Completed, retry_count }
            }
        }

        (state, event) => {
            warn!(state = state.name(), ?event, "Ignoring event that does not apply to the current state");
            Session { state, retry_count }
        }
    }
}

// ===============================================
// SESSION DRIVER
// ===============================================

/// The side-effecting steps the controller sequences.
pub trait WorkCycle {
    /// Clears transient state before a new cycle.
    fn reset(&mut self);
    fn fetch(&mut self) -> Result<WorkDescriptor, CycleError>;
    fn process(&mut self, work: &WorkDescriptor) -> Result<UnitOutcome, CycleError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Completed { sentinel_key: Option<String> },
    Exhausted { retries: u32 },
    Interrupted,
}

/// Drives `cycle` from `Initializing` until a terminal state or an interrupt.
///
/// `shutdown` is checked between steps; an interrupt ends the session without
/// passing through `Error`. `pause` waits out the retry sleep after a fault;
/// a break from it is treated as an interrupt.
pub fn run_session<W, P>(cycle: &mut W, policy: &SessionPolicy, shutdown: &AtomicBool, mut pause: P) -> SessionEnd
where
    W: WorkCycle,
    P: FnMut(Duration) -> ControlFlow<()>,
{
    let mut session = Session::default();
    let mut sentinel_key = None;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!(state = session.state.name(), "Interrupted by user");
            return SessionEnd::Interrupted;
        }

        let event = match &session.state {
            ProgramState::Initializing => {
                cycle.reset();
                Event::Initialized
            }
            ProgramState::Fetching => cycle.fetch().map_or_else(Event::Fault, Event::WorkFetched),
            ProgramState::Processing(work) => cycle.process(work).map_or_else(Event::Fault, Event::UnitDone),
            ProgramState::Completed => return SessionEnd::Completed { sentinel_key },
            ProgramState::Error => {
                error!(retries = session.retry_count, "Retry ceiling reached, giving up");
                return SessionEnd::Exhausted { retries: session.retry_count };
            }
        };

        // the step may have been cut short by the interrupt; do not count it as a fault
        if shutdown.load(Ordering::SeqCst) {
            info!(state = session.state.name(), "Interrupted by user");
            return SessionEnd::Interrupted;
        }

        match &event {
            Event::Fault(e) => error!(
                state = session.state.name(),
                retry = session.retry_count + 1,
                max_retries = policy.max_retries,
                error = %e,
                "Cycle failed"
            ),
            Event::UnitDone(UnitOutcome::SentinelFound(key)) => sentinel_key = Some(key.clone()),
            Event::UnitDone(UnitOutcome::Submitted(summary)) => info!(
                batches = summary.batches_submitted,
                keys_dropped = summary.keys_dropped,
                "Work unit submitted"
            ),
            _ => {}
        }

        let faulted = matches!(event, Event::Fault(_));
        session = transition(session, event, policy);

        if faulted && session.state == ProgramState::Initializing {
            info!(sleep_secs = policy.retry_sleep.as_secs(), "Retrying cycle after pause");
            if pause(policy.retry_sleep).is_break() {
                info!(state = session.state.name(), "Interrupted by user");
                return SessionEnd::Interrupted;
            }
        }
    }
}

// ===============================================
// POOL WORKER
// ===============================================

/// The real cycle: HTTP pool, handoff files, external solver.
pub struct PoolWorker<'a> {
    pub pool: &'a PoolContext,
    pub solver: SolverConfig,
    pub sentinel: String,
    pub clear_screen: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl PoolWorker<'_> {
    fn discard_output(&self) {
        if let Err(e) = handoff::truncate(&self.solver.output_file) {
            warn!(error = %e, "Could not clear solver output");
        }
    }
}

impl WorkCycle for PoolWorker<'_> {
    fn reset(&mut self) {
        if self.clear_screen {
            utils::clear_screen();
        }
        self.discard_output();
    }

    fn fetch(&mut self) -> Result<WorkDescriptor, CycleError> {
        Ok(api::fetch_work_with_retry(self.pool, |delay| utils::pause(&self.shutdown, delay))?)
    }

    fn process(&mut self, work: &WorkDescriptor) -> Result<UnitOutcome, CycleError> {
        handoff::write_input(&self.solver.input_file, &work.target_addresses, &self.sentinel)?;

        if let Err(e) = solver::run_solver(&self.solver, &work.range, &self.shutdown) {
            self.discard_output();
            return Err(e.into());
        }

        match reconcile(&self.solver.input_file, &self.solver.output_file, &self.sentinel) {
            Outcome::SentinelFound(key) => Ok(UnitOutcome::SentinelFound(key)),
            Outcome::Incomplete { found, expected } => Err(CycleError::Incomplete { found, expected }),
            Outcome::ParseFailure(reason) => Err(CycleError::ParseFailure(reason)),
            Outcome::Complete(keys) => {
                let summary = api::submit_keys(self.pool, &keys);
                if summary.is_success() {
                    Ok(UnitOutcome::Submitted(summary))
                } else {
                    Err(CycleError::Submission {
                        failed: summary.batches_failed,
                        total: summary.batches_failed + summary.batches_submitted,
                    })
                }
            }
        }
    }
}
