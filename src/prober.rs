use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::Target;
use crate::models::{CheckResult, Outcome};

/// Body posted with each check. The receiving end treats the check as a
/// heartbeat, so the payload carries the send time.
#[derive(Serialize)]
struct ProbePayload {
    timestamp: String,
}

/// Run a single check attempt against `target`.
///
/// Posts a timestamped heartbeat with the token in the `Authorization`
/// header and classifies whatever happens into an [`Outcome`]; transport
/// errors are never propagated. The timeout is enforced with
/// `tokio::time::timeout` around the request, so a caller that drops this
/// future cancels the request immediately. No retries happen here; the next
/// scheduled tick is the retry.
pub async fn check(client: &reqwest::Client, target: &Target, timeout: Duration) -> CheckResult {
    let timestamp = Utc::now();
    let started = Instant::now();

    let request = client
        .post(target.url.clone())
        .header(reqwest::header::AUTHORIZATION, target.token.clone())
        .json(&ProbePayload {
            timestamp: timestamp.to_rfc3339(),
        })
        .send();

    let (outcome, detail) = match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) => classify_status(response.status()),
        Ok(Err(error)) => classify_error(&error, timeout),
        Err(_) => (
            Outcome::Timeout,
            format!("no response within {} ms", timeout.as_millis()),
        ),
    };

    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!("check of {} finished: {} ({:.1} ms)", target.url, outcome, latency_ms);

    CheckResult {
        timestamp,
        target_url: target.url.to_string(),
        outcome,
        latency_ms,
        detail,
    }
}

fn classify_status(status: reqwest::StatusCode) -> (Outcome, String) {
    if status.is_success() {
        (Outcome::Success, format!("HTTP {}", status.as_u16()))
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        (
            Outcome::AuthFailed,
            format!("server rejected token with HTTP {}", status.as_u16()),
        )
    } else {
        (
            Outcome::UnexpectedStatus(status.as_u16()),
            format!("HTTP {}", status.as_u16()),
        )
    }
}

fn classify_error(error: &reqwest::Error, timeout: Duration) -> (Outcome, String) {
    if error.is_timeout() {
        (
            Outcome::Timeout,
            format!("no response within {} ms", timeout.as_millis()),
        )
    } else if error.is_connect() {
        (
            Outcome::Unreachable,
            format!("connection failed: {}", error_detail(error)),
        )
    } else {
        (
            Outcome::Unreachable,
            format!("request failed: {}", error_detail(error)),
        )
    }
}

/// Innermost cause of a reqwest error; the outer layers only repeat the url.
fn error_detail(error: &reqwest::Error) -> String {
    let mut cause: &dyn std::error::Error = error;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause.to_string()
}
