//! Adaptive capture-and-correlation scheduler.
//!
//! # State machine
//!
//! ```text
//!   start()            timer fires           cycle resolves
//! Idle -------> Scheduled -----------> CycleActive ----------> Scheduled
//!  ^                |                       |
//!  +---- stop() ----+------- stop() --------+
//! ```
//!
//! - At most one cycle is in flight. A tick that fires while a cycle is
//!   active is skipped, and a manual capture is rejected with `Busy`.
//! - The timer is always re-armed from the session's interval as read at that
//!   moment, so an interval change made mid-cycle applies to the next re-arm.
//! - `stop()` cancels the in-flight cycle; its outcome is never delivered.
//!
//! The state machine lives in a single worker task (see `worker.rs`);
//! [`CaptureScheduler`] is a cheap handle that talks to it over channels.

mod cycle;
pub mod policy;
mod worker;


pub use policy::IntervalPolicy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use crate::analysis::{AnalysisResult, AnalysisTransport, PollerConfig, ResultPoller};
use crate::capture::CaptureDevice;
use crate::error::{ForgeError, Result};
use crate::runtime::ResultSink;
use crate::session::SessionContext;

use cycle::CycleDeps;
use worker::{SchedulerCommand, Worker};

/// Scheduler state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Not running
    Idle,
    /// Timer armed, no cycle in flight
    Scheduled,
    /// A capture is being captured, submitted or polled
    CycleActive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub policy: IntervalPolicy,
    pub poller: PollerConfig,
}

/// Handle to a running scheduler worker.
///
/// Clones share the same worker, which exits once every handle is dropped
/// or `shutdown` is called.
#[derive(Clone)]
pub struct CaptureScheduler {
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    state_rx: watch::Receiver<SchedulerState>,
    session: Arc<SessionContext>,
}

impl CaptureScheduler {
    /// Create a scheduler and spawn its worker task. Starts in `Idle`.
    pub fn spawn(
        config: SchedulerConfig,
        session: Arc<SessionContext>,
        device: Arc<dyn CaptureDevice>,
        transport: Arc<dyn AnalysisTransport>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let deps = CycleDeps {
            device,
            poller: Arc::new(ResultPoller::new(transport.clone(), config.poller)),
            transport,
        };
        let worker = Worker::new(config, session.clone(), deps, sink, state_tx);

        tokio::spawn(async move {
            worker.run(command_rx).await;
        });

        Self {
            command_tx,
            state_rx,
            session,
        }
    }

    /// Acquire the capture device and begin periodic capture.
    ///
    /// Fails with `AlreadyRunning` unless `Idle` (a manual capture in flight
    /// counts), or `DeviceUnavailable` if the device cannot be acquired;
    /// neither changes the state.
    pub async fn start(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Start { reply })?;
        rx.await.map_err(|_| ForgeError::SchedulerClosed)?
    }

    /// Stop capturing. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Stop { reply })?;
        rx.await.map_err(|_| ForgeError::SchedulerClosed)
    }

    /// Capture and analyse one frame with `text` right now.
    ///
    /// Rejected with `Busy` while any cycle is in flight. The outcome is also
    /// pushed to the result sink.
    pub async fn capture_once(&self, text: impl Into<String>) -> Result<AnalysisResult> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::CaptureOnce {
            text: text.into(),
            reply,
        })?;
        rx.await.map_err(|_| ForgeError::SchedulerClosed)?
    }

    /// Stop and terminate the worker task.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(SchedulerCommand::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    pub fn current_interval(&self) -> Duration {
        self.session.interval()
    }

    /// Override the capture interval. Applies from the next re-arm.
    pub fn set_interval(&self, ms: u64) -> u64 {
        self.session.set_interval(ms)
    }

    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.session.last_result()
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| ForgeError::SchedulerClosed)
    }
}
