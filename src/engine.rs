use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, Target};
use crate::models::{CheckResult, MonitorState, StatusSnapshot};
use crate::prober;
use crate::reporter::Reporter;

/// How long `stop` waits for the check loop to wind down before aborting it.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Host-supplied predicate consulted before each tick. Returning false skips
/// the tick entirely: no check runs and no event is published. The desktop
/// host wires this to its user-idle detector to pause heartbeats while the
/// machine is unattended.
pub type TickGate = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("engine has been stopped and cannot be restarted")]
    Stopped,
    #[error("engine is not running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct RunSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    target_tx: watch::Sender<Target>,
}

struct Lifecycle {
    phase: Phase,
    interval: Duration,
    slot: Option<RunSlot>,
}

/// Periodic health-check engine for a single target.
///
/// Lifecycle is `Idle -> Running -> Stopped`, with `Stopped` terminal.
/// While running, a single loop task owns the cadence: ticks that fire while
/// a check is still in flight are coalesced, never queued, so two checks
/// cannot overlap.
pub struct Engine {
    config: MonitorConfig,
    client: reqwest::Client,
    reporter: Reporter,
    state: Arc<Mutex<MonitorState>>,
    lifecycle: Mutex<Lifecycle>,
    gate: Option<TickGate>,
}

impl Engine {
    pub fn new(config: MonitorConfig, reporter: Reporter) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            reporter,
            state: Arc::new(Mutex::new(MonitorState { last_result: None })),
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Idle,
                interval: Duration::ZERO,
                slot: None,
            }),
            gate: None,
        }
    }

    /// Install a tick gate. Builder-style, call before `start`.
    pub fn with_gate(mut self, gate: TickGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Begin checking `target` every `interval`. The first check runs one
    /// full interval after this call, not immediately.
    pub async fn start(&self, target: Target, interval: Duration) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.phase {
            Phase::Running => return Err(EngineError::AlreadyRunning),
            Phase::Stopped => return Err(EngineError::Stopped),
            Phase::Idle => {}
        }

        let (target_tx, target_rx) = watch::channel(target);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ctx = TickContext {
            client: self.client.clone(),
            timeout: Duration::from_millis(self.config.timeout_ms),
            interval,
            webhook_url: self.config.webhook_url.clone(),
            reporter: self.reporter.clone(),
            state: Arc::clone(&self.state),
            gate: self.gate.clone(),
        };
        let handle = tokio::spawn(run_loop(ctx, target_rx, shutdown_rx));

        lifecycle.slot = Some(RunSlot {
            handle,
            shutdown_tx,
            target_tx,
        });
        lifecycle.interval = interval;
        lifecycle.phase = Phase::Running;
        info!("engine started, first check in {:?}", interval);
        Ok(())
    }

    /// Swap the target used from the next tick onward. A check already in
    /// flight finishes against the target it started with.
    pub async fn update_target(&self, target: Target) -> Result<(), EngineError> {
        let lifecycle = self.lifecycle.lock().await;
        match &lifecycle.slot {
            Some(slot) => {
                info!("target updated to {}", target.url);
                slot.target_tx.send(target).map_err(|_| EngineError::NotRunning)
            }
            None => Err(EngineError::NotRunning),
        }
    }

    /// Stop checking. Cancels an in-flight check, is idempotent, and is
    /// terminal: the engine cannot be started again afterwards.
    pub async fn stop(&self) {
        // Take the slot out of the lock before waiting on the task, so the
        // loop can still reach the shared state while winding down.
        let slot = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.phase = Phase::Stopped;
            lifecycle.slot.take()
        };
        let Some(slot) = slot else {
            debug!("stop called on an engine that is not running");
            return;
        };

        let _ = slot.shutdown_tx.send(true);
        let abort = slot.handle.abort_handle();
        if time::timeout(STOP_GRACE, slot.handle).await.is_err() {
            warn!("check loop did not wind down within {:?}, aborting it", STOP_GRACE);
            abort.abort();
        }
        info!("engine stopped");
    }

    /// Point-in-time view of the engine for the status API.
    pub async fn status(&self) -> StatusSnapshot {
        let (running, interval) = {
            let lifecycle = self.lifecycle.lock().await;
            (lifecycle.phase == Phase::Running, lifecycle.interval)
        };
        let last_result = self.state.lock().await.last_result.clone();
        StatusSnapshot {
            running,
            interval_secs: interval.as_secs(),
            last_result,
            events_dropped: self.reporter.events_dropped(),
        }
    }

    pub async fn last_result(&self) -> Option<CheckResult> {
        self.state.lock().await.last_result.clone()
    }
}

struct TickContext {
    client: reqwest::Client,
    timeout: Duration,
    interval: Duration,
    webhook_url: Option<String>,
    reporter: Reporter,
    state: Arc<Mutex<MonitorState>>,
    gate: Option<TickGate>,
}

async fn run_loop(
    ctx: TickContext,
    mut target_rx: watch::Receiver<Target>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // First tick after one full interval; ticks that fire while a check is
    // still in flight are skipped, not queued.
    let mut ticker = time::interval_at(time::Instant::now() + ctx.interval, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => {
                debug!("check loop shutting down");
                break;
            }
        }

        if let Some(gate) = &ctx.gate {
            if !gate() {
                debug!("tick gated off, skipping check");
                continue;
            }
        }

        // Snapshot the target for this tick; updates apply from the next one.
        let target = target_rx.borrow_and_update().clone();

        let result = tokio::select! {
            result = prober::check(&ctx.client, &target, ctx.timeout) => result,
            _ = shutdown_rx.changed() => {
                debug!("in-flight check cancelled by stop");
                break;
            }
        };

        process_result(&ctx, result).await;
    }
}

async fn process_result(ctx: &TickContext, result: CheckResult) {
    let previous = ctx.state.lock().await.last_result.replace(result.clone());

    let was_up = previous.as_ref().map(|r| r.outcome.is_success());
    let is_up = result.outcome.is_success();
    // A missing previous result counts as up, so a failing first check is
    // reported as a transition.
    let transitioned = was_up.unwrap_or(true) != is_up;

    if transitioned {
        let line = format!("[CHANGE] {} -> {}", result.target_url, result.outcome);
        if is_up {
            warn!("{}", line);
        } else {
            error!("{}", line);
        }

        if let Some(webhook_url) = &ctx.webhook_url {
            let client = ctx.client.clone();
            let webhook_url = webhook_url.clone();
            let from = previous
                .map(|r| r.outcome.to_string())
                .unwrap_or_else(|| "Success".to_string());
            let result = result.clone();
            tokio::spawn(async move {
                send_webhook(client, webhook_url, result, from).await;
            });
        }
    }

    ctx.reporter.publish(&result);
}

async fn send_webhook(client: reqwest::Client, url: String, result: CheckResult, from: String) {
    let payload = json!({
        "target": result.target_url,
        "from": from,
        "to": result.outcome.to_string(),
        "detail": result.detail,
        "latency_ms": result.latency_ms,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Err(error) = client.post(&url).json(&payload).send().await {
        warn!("status webhook delivery failed: {}", error);
    }
}
