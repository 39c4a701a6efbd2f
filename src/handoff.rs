// src/handoff.rs
//
// The two plain-text files shared with the external solver. The input file
// lists one address per line (targets, then the sentinel); the output file
// carries `Pub Addr: <address>` records each followed by a
// `Priv (HEX): <key>` record.

use crate::address::is_valid_address;
use crate::error::{HandoffError, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_INPUT_FILE: &str = "in.txt";
pub const DEFAULT_OUTPUT_FILE: &str = "out.txt";

pub const PUB_ADDR_MARKER: &str = "Pub Addr: ";
pub const PRIV_HEX_MARKER: &str = "Priv (HEX): ";

// ===============================================
// INPUT FILE
// ===============================================

/// Renders the input file body: every target on its own line, then the sentinel.
pub fn render_input(targets: &[String], sentinel: &str) -> String {
    let mut body = String::new();
    for address in targets.iter().map(String::as_str).chain(std::iter::once(sentinel)) {
        body.push_str(address);
        body.push('\n');
    }
    body
}

/// Overwrites the input file with `targets` followed by `sentinel`.
///
/// Nothing is written when the target list is empty or the sentinel is not a
/// valid address. The file is synced before returning so the solver never
/// sees a partially written list.
pub fn write_input(path: &Path, targets: &[String], sentinel: &str) -> Result<()> {
    if targets.is_empty() {
        return Err(HandoffError::EmptyTargets);
    }
    if !is_valid_address(sentinel) {
        return Err(HandoffError::InvalidSentinel(sentinel.to_string()));
    }
    for target in targets.iter().filter(|t| !is_valid_address(t)) {
        warn!(address = %target, "Target does not look like a pool address; passing it through");
    }

    let file = File::create(path).map_err(|e| HandoffError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(render_input(targets, sentinel).as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| HandoffError::io(path, e))?;
    writer.get_ref().sync_all().map_err(|e| HandoffError::io(path, e))?;

    info!(path = %path.display(), targets = targets.len(), "Wrote solver input");
    Ok(())
}

/// Reads the input file back as trimmed, non-empty lines in file order.
pub fn read_input(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| HandoffError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

// ===============================================
// OUTPUT FILE
// ===============================================

/// Address → private key pairs recovered from solver output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FoundKeys {
    keys: HashMap<String, String>,
    /// Key records that had no unpaired address before them.
    pub orphan_keys: usize,
    /// Announced addresses that failed validation.
    pub rejected_addresses: usize,
}

impl FoundKeys {
    pub fn get(&self, address: &str) -> Option<&String> {
        self.keys.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn marker_value<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|at| line[at + marker.len()..].trim())
}

/// Streams solver output, pairing each address record with the next key record.
///
/// A key record with no pending address is skipped rather than treated as an
/// error. When the same address is announced twice, the later key wins.
pub fn parse_output<R: BufRead>(reader: R) -> io::Result<FoundKeys> {
    let mut found = FoundKeys::default();
    let mut pending: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        if let Some(address) = marker_value(&line, PUB_ADDR_MARKER) {
            if is_valid_address(address) {
                pending = Some(address.to_string());
            } else {
                debug!(address, "Ignoring malformed address record");
                found.rejected_addresses += 1;
                pending = None;
            }
        } else if let Some(key) = marker_value(&line, PRIV_HEX_MARKER) {
            match pending.take() {
                Some(address) => {
                    found.keys.insert(address, key.to_string());
                }
                None => found.orphan_keys += 1,
            }
        }
    }
    Ok(found)
}

/// Parses the output file. A missing file reads as empty output.
pub fn read_output(path: &Path) -> Result<FoundKeys> {
    match File::open(path) {
        Ok(file) => parse_output(BufReader::new(file)).map_err(|e| HandoffError::io(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Solver output file not found");
            Ok(FoundKeys::default())
        }
        Err(e) => Err(HandoffError::io(path, e)),
    }
}

/// Empties `path`, creating it when absent.
pub fn truncate(path: &Path) -> Result<()> {
    File::create(path).map_err(|e| HandoffError::io(path, e))?;
    debug!(path = %path.display(), "Truncated handoff file");
    Ok(())
}
