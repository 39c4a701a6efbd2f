pub mod address;
pub mod backoff;
pub mod error;
pub mod handoff;

pub use address::is_valid_address;
pub use backoff::{retry, Backoff};
pub use error::HandoffError;
pub use handoff::FoundKeys;

use std::path::Path;
use tracing::{error, info, warn};

// --------------------------------------------------------------------------
// RECONCILIATION
// --------------------------------------------------------------------------

/// What one solver run produced, judged against the work it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The canary address was solved. Carries its key; nothing is submitted.
    SentinelFound(String),
    /// Every target has a key. Keys follow the input file's target order.
    Complete(Vec<String>),
    /// Output did not cover the targets exactly; all of it was discarded.
    Incomplete { found: usize, expected: usize },
    /// A handoff file could not be read (or the output could not be cleared).
    ParseFailure(String),
}

/// Matches solver output against the target list and clears the output file.
///
/// The targets are re-read from `input` with every occurrence of `sentinel`
/// removed. Results are all-or-nothing: unless every target has a key and the
/// number of discovered pairs equals the number of targets, the outcome is
/// [`Outcome::Incomplete`]. Whatever the outcome, `output` is empty when this
/// returns; if it cannot be emptied the outcome becomes
/// [`Outcome::ParseFailure`] so stale keys are never acted upon twice.
pub fn reconcile(input: &Path, output: &Path, sentinel: &str) -> Outcome {
    let outcome = match_output(input, output, sentinel);

    if let Err(e) = handoff::truncate(output) {
        error!(error = %e, "Could not clear solver output");
        return Outcome::ParseFailure(e.to_string());
    }
    outcome
}

fn match_output(input: &Path, output: &Path, sentinel: &str) -> Outcome {
    let targets: Vec<String> = match handoff::read_input(input) {
        Ok(lines) => lines.into_iter().filter(|address| address != sentinel).collect(),
        Err(e) => return Outcome::ParseFailure(e.to_string()),
    };
    let found = match handoff::read_output(output) {
        Ok(found) => found,
        Err(e) => return Outcome::ParseFailure(e.to_string()),
    };
    if found.orphan_keys > 0 || found.rejected_addresses > 0 {
        warn!(
            orphan_keys = found.orphan_keys,
            rejected_addresses = found.rejected_addresses,
            "Skipped malformed records in solver output"
        );
    }

    if let Some(key) = found.get(sentinel) {
        info!(sentinel, "Sentinel key present in solver output");
        return Outcome::SentinelFound(key.clone());
    }

    let covered = targets.iter().all(|address| found.contains(address));
    if found.len() != targets.len() || !covered {
        warn!(found = found.len(), expected = targets.len(), "Solver output does not cover the work unit");
        return Outcome::Incomplete { found: found.len(), expected: targets.len() };
    }

    let keys: Vec<String> = targets.iter().filter_map(|address| found.get(address).cloned()).collect();
    info!(keys = keys.len(), "Solver output matches every target");
    Outcome::Complete(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const T1: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const T2: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const T3: &str = "1FeexV6bAHb8ybZjqQMjJrcCrHGW9sb6uF";
    const OUTSIDER: &str = "12c6DSiU4Rq3P4ZxziKxzrGq2NZ6KZhwEm";
    const SENTINEL: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";

    struct Cycle {
        _dir: tempfile::TempDir,
        input: std::path::PathBuf,
        output: std::path::PathBuf,
    }

    fn cycle(targets: &[&str], output: Option<&str>) -> Cycle {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        handoff::write_input(&input, &targets, SENTINEL).unwrap();
        if let Some(body) = output {
            fs::write(&out, body).unwrap();
        }
        Cycle { _dir: dir, input, output: out }
    }

    fn pair(address: &str, key: &str) -> String {
        format!("Pub Addr: {address}\nPriv (HEX): {key}\n")
    }

    fn output_is_empty(c: &Cycle) -> bool {
        fs::read_to_string(&c.output).unwrap().is_empty()
    }

    #[test]
    fn complete_keys_follow_input_order() {
        let body = [pair(T3, "0x33"), pair(T1, "0x11"), pair(T2, "0x22")].concat();
        let c = cycle(&[T1, T2, T3], Some(&body));

        let outcome = reconcile(&c.input, &c.output, SENTINEL);

        assert_eq!(outcome, Outcome::Complete(vec!["0x11".into(), "0x22".into(), "0x33".into()]));
        assert!(output_is_empty(&c));
    }

    #[test]
    fn fewer_pairs_than_targets_is_incomplete() {
        let body = [pair(T1, "0x11"), pair(T2, "0x22")].concat();
        let c = cycle(&[T1, T2, T3], Some(&body));

        assert_eq!(reconcile(&c.input, &c.output, SENTINEL), Outcome::Incomplete { found: 2, expected: 3 });
        assert!(output_is_empty(&c));
    }

    #[test]
    fn foreign_pair_cannot_stand_in_for_a_missing_target() {
        let body = [pair(T1, "0x11"), pair(OUTSIDER, "0x99")].concat();
        let c = cycle(&[T1, T2], Some(&body));

        assert_eq!(reconcile(&c.input, &c.output, SENTINEL), Outcome::Incomplete { found: 2, expected: 2 });
    }

    #[test]
    fn sentinel_short_circuits_regardless_of_other_pairs() {
        let body = [pair(T1, "0x11"), pair(SENTINEL, "0x5E"), pair(T2, "0x22"), pair(T3, "0x33")].concat();
        let c = cycle(&[T1, T2, T3], Some(&body));

        assert_eq!(reconcile(&c.input, &c.output, SENTINEL), Outcome::SentinelFound("0x5E".into()));
        assert!(output_is_empty(&c));

        let lone = cycle(&[T1, T2, T3], Some(&pair(SENTINEL, "0x5E")));
        assert_eq!(reconcile(&lone.input, &lone.output, SENTINEL), Outcome::SentinelFound("0x5E".into()));
    }

    #[test]
    fn missing_output_is_incomplete_and_leaves_empty_file() {
        let c = cycle(&[T1], None);

        assert_eq!(reconcile(&c.input, &c.output, SENTINEL), Outcome::Incomplete { found: 0, expected: 1 });
        assert!(output_is_empty(&c));
    }

    #[test]
    fn garbage_output_is_always_cleared() {
        let c = cycle(&[T1], Some("\u{1b}[2Kprogress 12.5 Mkey/s\nPriv (HEX): 0xdead\n###\n"));

        assert_eq!(reconcile(&c.input, &c.output, SENTINEL), Outcome::Incomplete { found: 0, expected: 1 });
        assert!(output_is_empty(&c));
    }

    #[test]
    fn missing_input_is_a_parse_failure() {
        let c = cycle(&[T1], Some(&pair(T1, "0x11")));
        fs::remove_file(&c.input).unwrap();

        assert!(matches!(reconcile(&c.input, &c.output, SENTINEL), Outcome::ParseFailure(_)));
        assert!(output_is_empty(&c));
    }
}
