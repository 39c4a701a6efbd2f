// src/backoff.rs

use std::fmt::Display;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::warn;

/// Jitter-free exponential backoff: starts at `min`, multiplies by `factor`
/// after every delay handed out, never exceeds `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(min_secs: u64, max_secs: u64, factor: f64) -> Self {
        let max = Duration::from_secs(max_secs);
        let min = Duration::from_secs(min_secs).min(max);
        let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        Self { max, factor, current: min }
    }

    /// Hands out the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.factor)
            .unwrap_or(self.max)
            .min(self.max);
        delay
    }
}

/// Runs `op` up to `max_attempts` times (at least once).
///
/// After every failed attempt except the last, `pause` receives the next
/// backoff delay. If it breaks, no further attempt is made. The error of the
/// last attempt is returned unchanged.
pub fn retry<T, E, F, P>(max_attempts: u32, backoff: &mut Backoff, mut pause: P, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    P: FnMut(Duration) -> ControlFlow<()>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!(attempt, max_attempts, error = %e, "Giving up after final attempt");
                return Err(e);
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(attempt, max_attempts, delay_secs = delay.as_secs_f64(), error = %e, "Attempt failed, backing off");
                if pause(delay).is_break() {
                    warn!(attempt, "Retry abandoned during backoff");
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    fn record(pauses: &mut Vec<Duration>) -> impl FnMut(Duration) -> ControlFlow<()> + '_ {
        move |d| {
            pauses.push(d);
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::new(4, 10, 2.0);
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays, secs(&[4, 8, 10, 10, 10]));
    }

    #[test]
    fn degenerate_parameters_stay_bounded() {
        let mut shrinking = Backoff::new(4, 10, 0.5);
        assert_eq!(shrinking.next_delay(), Duration::from_secs(4));
        assert_eq!(shrinking.next_delay(), Duration::from_secs(4));

        let mut inverted = Backoff::new(30, 10, 2.0);
        assert_eq!(inverted.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn retry_stops_at_first_success() {
        let mut backoff = Backoff::new(4, 10, 2.0);
        let mut pauses = Vec::new();
        let result: Result<u32, String> = retry(3, &mut backoff, record(&mut pauses), |attempt| {
            if attempt < 2 { Err(format!("attempt {attempt} failed")) } else { Ok(attempt) }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(pauses, secs(&[4]));
    }

    #[test]
    fn retry_surfaces_last_error_without_trailing_pause() {
        let mut backoff = Backoff::new(4, 10, 2.0);
        let mut pauses = Vec::new();
        let mut calls = 0;
        let result: Result<(), String> = retry(3, &mut backoff, record(&mut pauses), |attempt| {
            calls += 1;
            Err(format!("attempt {attempt} failed"))
        });
        assert_eq!(result, Err("attempt 3 failed".to_string()));
        assert_eq!(calls, 3);
        assert_eq!(pauses, secs(&[4, 8]));
    }

    #[test]
    fn retry_stops_when_pause_breaks() {
        let mut backoff = Backoff::new(4, 10, 2.0);
        let mut calls = 0;
        let result: Result<(), String> = retry(3, &mut backoff, |_| ControlFlow::Break(()), |attempt| {
            calls += 1;
            Err(format!("attempt {attempt} failed"))
        });
        assert_eq!(result, Err("attempt 1 failed".to_string()));
        assert_eq!(calls, 1);
    }

    #[test]
    fn retry_runs_at_least_once() {
        let mut backoff = Backoff::new(4, 10, 2.0);
        let mut calls = 0;
        let result: Result<(), &str> = retry(0, &mut backoff, |_| panic!("no pause expected"), |_| {
            calls += 1;
            Err("down")
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
