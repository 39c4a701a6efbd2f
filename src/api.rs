// src/api.rs

use crate::data_types::{KeyBatch, PoolContext, WorkDescriptor, WorkResponse};
use indicatif::{ProgressBar, ProgressStyle};
use pool_keysearch_lib::{retry, Backoff};
use reqwest::blocking::{self, Response};
use reqwest::StatusCode;
use std::ops::ControlFlow;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub const POOL_TOKEN_HEADER: &str = "pool-token";
pub const DEFAULT_BATCH_SIZE: usize = 10;

const FETCH_BACKOFF_MIN_SECS: u64 = 4;
const FETCH_BACKOFF_MAX_SECS: u64 = 10;
const FETCH_BACKOFF_FACTOR: f64 = 2.0;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed work response: {0}")]
    Schema(String),
}

impl PoolError {
    /// Transport faults may clear up on their own; schema faults will not.
    pub fn is_transport(&self) -> bool {
        !matches!(self, PoolError::Schema(_))
    }
}

pub fn build_client(timeout: Duration) -> Result<blocking::Client, PoolError> {
    Ok(blocking::Client::builder().timeout(timeout).build()?)
}

fn check_status(response: Response) -> Result<Response, PoolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(PoolError::Status { status, body })
}

// ===============================================
// WORK FETCHER
// ===============================================

/// One GET for the next work unit; returns the raw body of a 2xx response.
fn request_work_body(context: &PoolContext) -> Result<String, PoolError> {
    let response = context
        .client
        .get(&context.api_url)
        .header(POOL_TOKEN_HEADER, &context.pool_token)
        .send()?;
    Ok(check_status(response)?.text()?)
}

pub fn parse_work(body: &str) -> Result<WorkDescriptor, PoolError> {
    let response: WorkResponse = serde_json::from_str(body).map_err(|e| PoolError::Schema(e.to_string()))?;
    response.into_descriptor().map_err(PoolError::Schema)
}

/// Fetches and validates a single work unit, without retrying.
pub fn fetch_work(context: &PoolContext) -> Result<WorkDescriptor, PoolError> {
    parse_work(&request_work_body(context)?)
}

/// Fetches a work unit, retrying the transport call with exponential backoff.
///
/// Only the network round-trip is retried. Schema validation runs once on the
/// body that finally arrived, since asking again would not fix a malformed
/// payload. `pause` performs the wait between attempts and may break to
/// abandon the remaining attempts.
pub fn fetch_work_with_retry<P>(context: &PoolContext, pause: P) -> Result<WorkDescriptor, PoolError>
where
    P: FnMut(Duration) -> ControlFlow<()>,
{
    let mut backoff = Backoff::new(FETCH_BACKOFF_MIN_SECS, FETCH_BACKOFF_MAX_SECS, FETCH_BACKOFF_FACTOR);
    let body = retry(context.fetch_attempts, &mut backoff, pause, |attempt| {
        debug!(attempt, url = %context.api_url, "Requesting work unit");
        request_work_body(context)
    })?;
    let work = parse_work(&body)?;
    info!(
        targets = work.target_addresses.len(),
        keyspace = %work.range.keyspace(),
        "Received work unit"
    );
    Ok(work)
}

// ===============================================
// BATCH SUBMITTER
// ===============================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmitSummary {
    pub batches_submitted: usize,
    pub batches_failed: usize,
    pub keys_dropped: usize,
}

impl SubmitSummary {
    pub fn is_success(&self) -> bool {
        self.batches_failed == 0
    }
}

/// POSTs one batch of private keys.
pub fn post_private_keys(context: &PoolContext, batch: &[String]) -> Result<(), PoolError> {
    let response = context
        .client
        .post(&context.api_url)
        .header(POOL_TOKEN_HEADER, &context.pool_token)
        .json(&KeyBatch { private_keys: batch })
        .send()?;
    check_status(response).map(|_| ())
}

/// Splits `keys` into batches of the configured size and submits each full batch.
///
/// A trailing batch shorter than the configured size is dropped, never sent.
/// A failed batch does not stop the ones after it. Dropped and failed keys are
/// logged in full.
pub fn submit_keys(context: &PoolContext, keys: &[String]) -> SubmitSummary {
    let batch_size = context.batch_size.max(1);
    let mut summary = SubmitSummary::default();

    let pb = ProgressBar::new((keys.len() / batch_size) as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} batches {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for (index, batch) in keys.chunks(batch_size).enumerate() {
        let batch_number = index + 1;
        if batch.len() < batch_size {
            info!(batch = batch_number, size = batch.len(), keys = ?batch, "Dropping short batch");
            summary.keys_dropped += batch.len();
            continue;
        }

        match post_private_keys(context, batch) {
            Ok(()) => {
                info!(batch = batch_number, size = batch.len(), "Submitted key batch");
                summary.batches_submitted += 1;
            }
            Err(e) => {
                error!(batch = batch_number, error = %e, keys = ?batch, "Key batch was not accepted");
                summary.batches_failed += 1;
            }
        }
        pb.inc(1);
        pb.set_message(format!("failed: {}", summary.batches_failed));
    }

    pb.finish_and_clear();
    summary
}
