use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified result category of one check attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Unreachable,
    Timeout,
    AuthFailed,
    UnexpectedStatus(u16),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Unreachable => write!(f, "Unreachable"),
            Outcome::Timeout => write!(f, "Timeout"),
            Outcome::AuthFailed => write!(f, "Auth failed"),
            Outcome::UnexpectedStatus(code) => write!(f, "Unexpected status {}", code),
        }
    }
}

/// Record of one completed check attempt. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub timestamp: DateTime<Utc>,
    pub target_url: String,
    pub outcome: Outcome,
    pub latency_ms: f64,
    pub detail: String,
}

/// One line of the status feed delivered to subscribers, derived 1:1 from
/// a [`CheckResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

pub struct MonitorState {
    pub last_result: Option<CheckResult>,
}

/// Point-in-time view of the engine, served by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub interval_secs: u64,
    pub last_result: Option<CheckResult>,
    pub events_dropped: u64,
}
