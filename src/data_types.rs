// src/data_types.rs

use reqwest::blocking;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::path::PathBuf;
use std::time::Duration;

// ===============================================
// API PAYLOADS
// ===============================================

/// Body of `GET <api_url>`. Both fields are optional here so that a missing
/// field surfaces as a schema fault rather than a decode error.
#[derive(Debug, Deserialize)]
pub struct WorkResponse {
    pub checkwork_addresses: Option<Vec<String>>,
    pub range: Option<RangeResponse>,
}

/// Range bounds are kept as raw JSON tokens so that a bare number wider
/// than 64 bits reaches the solver digit for digit.
#[derive(Debug, Deserialize)]
pub struct RangeResponse {
    pub start: Option<Box<RawValue>>,
    pub end: Option<Box<RawValue>>,
}

/// Turns a bound into solver text: a (hex) string is unquoted and trimmed,
/// an unsigned integer literal is taken as written. Anything else is a fault.
fn bound_text(name: &str, raw: Option<Box<RawValue>>) -> Result<String, String> {
    let raw = raw.ok_or_else(|| format!("range has no {name}"))?;
    let token = raw.get().trim();
    if token.starts_with('"') {
        let text: String = serde_json::from_str(token).map_err(|e| format!("range {name}: {e}"))?;
        Ok(text.trim().to_string())
    } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        Ok(token.to_string())
    } else {
        Err(format!("range {name} must be a string or an unsigned integer, got {token}"))
    }
}

/// Body of `POST <api_url>`.
#[derive(Debug, Serialize)]
pub struct KeyBatch<'a> {
    #[serde(rename = "privateKeys")]
    pub private_keys: &'a [String],
}

// ===============================================
// WORK UNIT
// ===============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRange {
    pub start: String,
    pub end: String,
}

impl KeyRange {
    /// The `start:end` form handed to the solver's `--keyspace` flag.
    pub fn keyspace(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkDescriptor {
    pub target_addresses: Vec<String>,
    pub range: KeyRange,
}

impl WorkResponse {
    /// Checks that the response carries a non-empty address list and both range bounds.
    pub fn into_descriptor(self) -> Result<WorkDescriptor, String> {
        let target_addresses = self
            .checkwork_addresses
            .ok_or_else(|| "response has no checkwork_addresses".to_string())?;
        if target_addresses.is_empty() {
            return Err("checkwork_addresses is empty".to_string());
        }
        let range = self.range.ok_or_else(|| "response has no range".to_string())?;
        let start = bound_text("start", range.start)?;
        let end = bound_text("end", range.end)?;
        if start.is_empty() || end.is_empty() {
            return Err("range bounds must not be blank".to_string());
        }

        Ok(WorkDescriptor { target_addresses, range: KeyRange { start, end } })
    }
}

// ===============================================
// RUNTIME CONFIGURATION
// ===============================================

/// Everything needed to talk to the coordinating service.
#[derive(Debug, Clone)]
pub struct PoolContext {
    pub client: blocking::Client,
    pub api_url: String,
    pub pool_token: String,
    pub fetch_attempts: u32,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct GpuSettings {
    pub gpu_id: u32,
    pub grid_size: String,
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub binary: PathBuf,
    pub threads: u32,
    /// `None` runs the solver on CPU only.
    pub gpu: Option<GpuSettings>,
    pub input_file: PathBuf,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Consecutive cycle faults tolerated before the session ends in ERROR.
    pub max_retries: u32,
    pub retry_sleep: Duration,
    /// Keep fetching new work after a successful submission.
    pub continuous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<WorkDescriptor, String> {
        decode_str(&value.to_string())
    }

    fn decode_str(body: &str) -> Result<WorkDescriptor, String> {
        serde_json::from_str::<WorkResponse>(body).unwrap().into_descriptor()
    }

    #[test]
    fn accepts_string_and_numeric_bounds() {
        let work = decode(json!({
            "checkwork_addresses": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],
            "range": { "start": " 20000000000000000 ", "end": 1234567 },
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(work.range.keyspace(), "20000000000000000:1234567");
        assert_eq!(work.target_addresses.len(), 1);
    }

    #[test]
    fn numeric_bounds_wider_than_u64_keep_every_digit() {
        let work = decode_str(
            r#"{
                "checkwork_addresses": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],
                "range": { "start": 1180591620717411303424, "end": 2361183241434822606847 }
            }"#,
        )
        .unwrap();
        assert_eq!(work.range.keyspace(), "1180591620717411303424:2361183241434822606847");
    }

    #[test]
    fn non_integer_bounds_are_schema_faults() {
        let body = |start: &str| {
            format!(r#"{{"checkwork_addresses":["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],"range":{{"start":{start},"end":"ff"}}}}"#)
        };
        assert!(decode_str(&body("1.5e21")).is_err());
        assert!(decode_str(&body("-4")).is_err());
        assert!(decode_str(&body("true")).is_err());
        assert!(decode_str(&body("\"  \"")).is_err());
    }

    #[test]
    fn missing_fields_are_schema_faults() {
        assert!(decode(json!({ "range": { "start": "1", "end": "2" } })).is_err());
        assert!(decode(json!({ "checkwork_addresses": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"] })).is_err());
        assert!(decode(json!({ "checkwork_addresses": [], "range": { "start": "1", "end": "2" } })).is_err());
        assert!(decode(json!({
            "checkwork_addresses": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],
            "range": { "start": "1" }
        }))
        .is_err());
        assert!(decode(json!({
            "checkwork_addresses": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],
            "range": { "start": "1", "end": null }
        }))
        .is_err());
    }

    #[test]
    fn key_batch_uses_wire_field_name() {
        let keys = vec!["0x01".to_string(), "0x02".to_string()];
        let body = serde_json::to_value(KeyBatch { private_keys: &keys }).unwrap();
        assert_eq!(body, json!({ "privateKeys": ["0x01", "0x02"] }));
    }
}
