use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What came back for a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The target responded with this HTTP status code.
    Status(u16),
    /// No response arrived within the request timeout.
    Timeout,
    /// The request could not be completed, for example the connection was refused.
    TransportError(String),
}

impl OutcomeStatus {
    /// The default failure classification: a transport error, a timeout or a non-2xx status.
    pub fn is_default_failure(&self) -> bool {
        match self {
            OutcomeStatus::Status(code) => !(200..300).contains(code),
            OutcomeStatus::Timeout | OutcomeStatus::TransportError(_) => true,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            OutcomeStatus::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// The immutable record of one completed request attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// When the request was started, as a Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    pub scenario: String,
    pub vu_id: String,
    /// The request name, usually the path template, used to group requests in summaries.
    pub name: String,
    pub method: Method,
    pub status: OutcomeStatus,
    pub latency: Duration,
    pub body_bytes: u64,
    /// Whether this attempt counts as a failed request.
    pub failed: bool,
}

impl RequestOutcome {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Timing record for a request in flight. Create it right before the request is sent and turn it
/// into a [RequestOutcome] once the attempt completes.
#[derive(Debug)]
pub struct RequestRecord {
    scenario: String,
    vu_id: String,
    name: String,
    method: Method,
    timestamp_ms: i64,
    started: Instant,
}

impl RequestRecord {
    pub fn start(scenario: &str, vu_id: &str, name: &str, method: Method) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Self {
            scenario: scenario.to_string(),
            vu_id: vu_id.to_string(),
            name: name.to_string(),
            method,
            timestamp_ms,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Complete the record using the time elapsed since [RequestRecord::start] as the latency.
    pub fn finish(self, status: OutcomeStatus, body_bytes: u64, failed: bool) -> RequestOutcome {
        let latency = self.elapsed();
        self.finish_with_latency(status, latency, body_bytes, failed)
    }

    /// Complete the record with an explicit latency. Timeouts use this to record the timeout bound.
    pub fn finish_with_latency(
        self,
        status: OutcomeStatus,
        latency: Duration,
        body_bytes: u64,
        failed: bool,
    ) -> RequestOutcome {
        RequestOutcome {
            timestamp_ms: self.timestamp_ms,
            scenario: self.scenario,
            vu_id: self.vu_id,
            name: self.name,
            method: self.method,
            status,
            latency,
            body_bytes,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_failure_classification() {
        assert!(!OutcomeStatus::Status(200).is_default_failure());
        assert!(!OutcomeStatus::Status(204).is_default_failure());
        assert!(OutcomeStatus::Status(301).is_default_failure());
        assert!(OutcomeStatus::Status(404).is_default_failure());
        assert!(OutcomeStatus::Status(503).is_default_failure());
        assert!(OutcomeStatus::Timeout.is_default_failure());
        assert!(OutcomeStatus::TransportError("refused".to_string()).is_default_failure());
    }

    #[test]
    fn timeout_keeps_explicit_latency() {
        let record = RequestRecord::start("inventory", "inventory-vu-0", "/health", Method::Get);
        let outcome = record.finish_with_latency(
            OutcomeStatus::Timeout,
            Duration::from_secs(60),
            0,
            true,
        );

        assert_eq!(Duration::from_secs(60), outcome.latency);
        assert_eq!(60_000.0, outcome.latency_ms());
        assert_eq!("inventory", outcome.scenario);
        assert!(outcome.failed);
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_string(&OutcomeStatus::Status(201)).unwrap();
        assert_eq!(r#"{"kind":"status","value":201}"#, json);

        let json = serde_json::to_string(&OutcomeStatus::Timeout).unwrap();
        assert_eq!(r#"{"kind":"timeout"}"#, json);
    }
}
