//! Proxy data models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Placeholder for metadata the input or the probe did not provide
pub const UNKNOWN: &str = "Unknown";

/// Render a JSON value as metadata text, or `None` if the value is falsy
/// (`null`, `false`, `""` or numeric zero).
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Read a metadata field from a probe body, falling back to [`UNKNOWN`].
///
/// Every string metric extracted from a probe response goes through here.
pub fn metadata_or_unknown(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(truthy_text)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Read a delay in milliseconds from a probe body, falling back to `0`.
///
/// Numeric strings are accepted, positive fractions round up so they stay
/// above zero, and negative or non-finite values clamp to zero.
pub fn delay_or_zero(body: &Value, key: &str) -> u64 {
    let delay = match body.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match delay {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms.ceil() as u64,
        _ => 0,
    }
}

/// Fill an optional input field, treating empty text as absent
pub fn field_or_unknown(field: Option<&str>) -> String {
    match field {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// A candidate proxy read from the input list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCandidate {
    pub host: String,
    pub port: u16,
    pub country: String,
    pub organization: String,
}

impl ProxyCandidate {
    /// Create a new candidate; missing country or organization become "Unknown"
    pub fn new(host: String, port: u16, country: Option<&str>, organization: Option<&str>) -> Self {
        Self {
            host,
            port,
            country: field_or_unknown(country),
            organization: field_or_unknown(organization),
        }
    }

    /// Get the proxy string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// Outcome of a single probe against one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub error: Option<String>,
    pub delay_ms: u64,
    pub asn: String,
    pub as_organization: String,
    pub colo: String,
    pub latitude: String,
    pub longitude: String,
    pub client_ip: Option<String>,
}

impl ProbeResult {
    /// A probe that failed before any usable response was seen
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            delay_ms: 0,
            asn: UNKNOWN.to_string(),
            as_organization: UNKNOWN.to_string(),
            colo: UNKNOWN.to_string(),
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
            client_ip: None,
        }
    }

    /// Build a result from a decoded JSON body.
    ///
    /// A truthy `error` field marks the probe unsuccessful. When `measured_ms`
    /// is `None` the delay is read from the body's `delay` field instead.
    pub fn from_body(body: &Value, measured_ms: Option<u64>) -> Self {
        let error = body.get("error").and_then(truthy_text);
        let delay_ms = measured_ms.unwrap_or_else(|| delay_or_zero(body, "delay"));
        let client_ip = body.get("clientIp").and_then(truthy_text);

        Self {
            success: error.is_none(),
            error,
            delay_ms,
            asn: metadata_or_unknown(body, "asn"),
            as_organization: metadata_or_unknown(body, "asOrganization"),
            colo: metadata_or_unknown(body, "colo"),
            latitude: metadata_or_unknown(body, "latitude"),
            longitude: metadata_or_unknown(body, "longitude"),
            client_ip,
        }
    }
}

/// Classification of a probed candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Alive,
    Dead,
}

impl Verdict {
    pub fn is_alive(&self) -> bool {
        matches!(self, Verdict::Alive)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Alive => write!(f, "Alive"),
            Verdict::Dead => write!(f, "Dead"),
        }
    }
}

/// One line of the output file: the candidate plus its probe metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub host: String,
    pub port: u16,
    pub country: String,
    pub organization: String,
    pub asn: String,
    pub as_organization: String,
    pub colo: String,
    pub latitude: String,
    pub longitude: String,
    pub delay_ms: u64,
}

impl OutputRecord {
    pub fn new(candidate: &ProxyCandidate, result: &ProbeResult) -> Self {
        Self {
            host: candidate.host.clone(),
            port: candidate.port,
            country: candidate.country.clone(),
            organization: candidate.organization.clone(),
            asn: result.asn.clone(),
            as_organization: result.as_organization.clone(),
            colo: result.colo.clone(),
            latitude: result.latitude.clone(),
            longitude: result.longitude.clone(),
            delay_ms: result.delay_ms,
        }
    }

    /// Serialize as `host,port,country,organization,asn,as_organization,colo,latitude,longitude,delay_ms`
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.host,
            self.port,
            self.country,
            self.organization,
            self.asn,
            self.as_organization,
            self.colo,
            self.latitude,
            self.longitude,
            self.delay_ms
        )
    }
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

/// Everything known about one candidate after it has been checked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Zero-based position in the input list
    pub index: usize,
    pub candidate: ProxyCandidate,
    pub result: ProbeResult,
    pub verdict: Verdict,
}

impl CheckOutcome {
    /// The output record for this candidate, if it survived
    pub fn record(&self) -> Option<OutputRecord> {
        self.verdict
            .is_alive()
            .then(|| OutputRecord::new(&self.candidate, &self.result))
    }

    /// Human-readable progress line, e.g. `[1/3] Alive 1.1.1.1:443 50ms US Cloudflare`
    pub fn progress_line(&self, total: usize) -> String {
        let position = format!("[{}/{}]", self.index + 1, total);
        match self.verdict {
            Verdict::Alive => format!(
                "{} Alive {} {}ms {} {}",
                position, self.candidate, self.result.delay_ms, self.candidate.country,
                self.result.as_organization
            ),
            Verdict::Dead => format!(
                "{} Dead {} ({})",
                position,
                self.candidate,
                self.result.error.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_defaults() {
        let candidate = ProxyCandidate::new("10.0.0.1".to_string(), 8080, None, Some(""));
        assert_eq!(candidate.country, UNKNOWN);
        assert_eq!(candidate.organization, UNKNOWN);
        assert_eq!(candidate.to_simple_string(), "10.0.0.1:8080");
    }

    #[test]
    fn test_metadata_fallback() {
        let body = json!({
            "asn": 13335,
            "asOrganization": "Cloudflare",
            "colo": "",
            "latitude": null,
            "longitude": 0,
        });
        assert_eq!(metadata_or_unknown(&body, "asn"), "13335");
        assert_eq!(metadata_or_unknown(&body, "asOrganization"), "Cloudflare");
        assert_eq!(metadata_or_unknown(&body, "colo"), UNKNOWN);
        assert_eq!(metadata_or_unknown(&body, "latitude"), UNKNOWN);
        assert_eq!(metadata_or_unknown(&body, "longitude"), UNKNOWN);
        assert_eq!(metadata_or_unknown(&body, "missing"), UNKNOWN);
    }

    #[test]
    fn test_delay_fallback() {
        assert_eq!(delay_or_zero(&json!({"delay": 120}), "delay"), 120);
        assert_eq!(delay_or_zero(&json!({"delay": 49.6}), "delay"), 50);
        assert_eq!(delay_or_zero(&json!({"delay": 0.4}), "delay"), 1);
        assert_eq!(delay_or_zero(&json!({"delay": "75"}), "delay"), 75);
        assert_eq!(delay_or_zero(&json!({"delay": -3}), "delay"), 0);
        assert_eq!(delay_or_zero(&json!({"delay": true}), "delay"), 0);
        assert_eq!(delay_or_zero(&json!({}), "delay"), 0);
    }

    #[test]
    fn test_result_from_body() {
        let body = json!({"delay": 120, "asn": "AS123", "clientIp": "5.6.7.8"});
        let result = ProbeResult::from_body(&body, None);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.delay_ms, 120);
        assert_eq!(result.asn, "AS123");
        assert_eq!(result.colo, UNKNOWN);
        assert_eq!(result.client_ip.as_deref(), Some("5.6.7.8"));

        let result = ProbeResult::from_body(&json!({"error": "timeout"}), None);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));

        let result = ProbeResult::from_body(&json!({"error": false, "delay": 10}), Some(33));
        assert!(result.success);
        assert_eq!(result.delay_ms, 33);
    }

    #[test]
    fn test_output_record_line() {
        let candidate = ProxyCandidate::new("1.1.1.1".to_string(), 443, Some("US"), Some("Cloudflare"));
        let body = json!({
            "delay": 50,
            "asn": 13335,
            "asOrganization": "Cloudflare, Inc",
            "colo": "SIN",
            "latitude": "1.29",
            "longitude": "103.85",
        });
        let record = OutputRecord::new(&candidate, &ProbeResult::from_body(&body, None));
        assert_eq!(
            record.to_line(),
            "1.1.1.1,443,US,Cloudflare,13335,Cloudflare, Inc,SIN,1.29,103.85,50"
        );
    }

    #[test]
    fn test_progress_lines() {
        let candidate = ProxyCandidate::new("1.1.1.1".to_string(), 443, Some("US"), None);
        let mut result = ProbeResult::from_body(&json!({"delay": 50, "asOrganization": "Cloudflare"}), None);
        let outcome = CheckOutcome {
            index: 0,
            candidate: candidate.clone(),
            result: result.clone(),
            verdict: Verdict::Alive,
        };
        assert_eq!(outcome.progress_line(2), "[1/2] Alive 1.1.1.1:443 50ms US Cloudflare");
        assert!(outcome.record().is_some());

        result.error = None;
        let outcome = CheckOutcome {
            index: 1,
            candidate: candidate.clone(),
            result,
            verdict: Verdict::Dead,
        };
        assert_eq!(outcome.progress_line(2), "[2/2] Dead 1.1.1.1:443 (unknown)");
        assert!(outcome.record().is_none());

        let outcome = CheckOutcome {
            index: 1,
            candidate,
            result: ProbeResult::failed("HTTP 502"),
            verdict: Verdict::Dead,
        };
        assert_eq!(outcome.progress_line(2), "[2/2] Dead 1.1.1.1:443 (HTTP 502)");
    }
}
