use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{CheckResult, LogEvent};

/// Fan-out point for the status feed.
///
/// Publishing never waits on subscribers. Each subscriber reads from a
/// bounded buffer; when one falls more than the buffer capacity behind, its
/// oldest undelivered events are discarded and the shared drop counter
/// advances by the number lost.
#[derive(Clone)]
pub struct Reporter {
    tx: broadcast::Sender<LogEvent>,
    dropped: Arc<AtomicU64>,
}

impl Reporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Render `result` into a log event and hand it to all subscribers.
    pub fn publish(&self, result: &CheckResult) -> LogEvent {
        let event = LogEvent {
            timestamp: result.timestamp,
            message: render(result),
        };
        // Err here only means nobody is subscribed right now.
        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Total events discarded across all subscribers since startup.
    pub fn events_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A subscriber's ordered view of the status feed.
pub struct EventStream {
    rx: broadcast::Receiver<LogEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventStream {
    /// Next event in generation order, or `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(lost)) => {
                    self.dropped.fetch_add(lost, Ordering::Relaxed);
                    debug!("subscriber lagged, {} events dropped", lost);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Single-line rendering of a check result.
pub fn render(result: &CheckResult) -> String {
    format!(
        "{}: {} ({}, {:.1} ms)",
        result.outcome, result.target_url, result.detail, result.latency_ms
    )
}
