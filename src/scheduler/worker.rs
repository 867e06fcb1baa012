//! Scheduler worker loop.
//!
//! A single task owns the state machine: the running flag, the timer deadline,
//! the active cycle and the device handle. Callers reach it only through
//! [`SchedulerCommand`]s; cycles report back on a completion channel that only
//! this task reads.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::cycle::{run_cycle, CycleCompletion, CycleDeps};
use super::{SchedulerConfig, SchedulerState};
use crate::analysis::{AnalysisResult, TriggerOrigin};
use crate::capture::DeviceHandle;
use crate::error::{ForgeError, Result};
use crate::runtime::{CycleRef, ResultSink, RuntimeEvent};
use crate::session::SessionContext;

/// Requests sent from [`super::CaptureScheduler`] to the worker
#[derive(Debug)]
pub(crate) enum SchedulerCommand {
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    CaptureOnce {
        text: String,
        reply: oneshot::Sender<Result<AnalysisResult>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// The cycle currently in flight
struct ActiveCycle {
    id: u64,
    origin: TriggerOrigin,
    cancel: CancellationToken,
    /// Caller waiting on a manual capture
    reply: Option<oneshot::Sender<Result<AnalysisResult>>>,
}

pub(crate) struct Worker {
    config: SchedulerConfig,
    session: Arc<SessionContext>,
    deps: CycleDeps,
    sink: Arc<dyn ResultSink>,
    state_tx: watch::Sender<SchedulerState>,
    running: bool,
    device: Option<DeviceHandle>,
    deadline: Option<Instant>,
    active: Option<ActiveCycle>,
    next_cycle_id: u64,
    completion_tx: mpsc::UnboundedSender<CycleCompletion>,
    completion_rx: mpsc::UnboundedReceiver<CycleCompletion>,
}

impl Worker {
    pub(crate) fn new(
        config: SchedulerConfig,
        session: Arc<SessionContext>,
        deps: CycleDeps,
        sink: Arc<dyn ResultSink>,
        state_tx: watch::Sender<SchedulerState>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            config,
            session,
            deps,
            sink,
            state_tx,
            running: false,
            device: None,
            deadline: None,
            active: None,
            next_cycle_id: 0,
            completion_tx,
            completion_rx,
        }
    }

    /// Main worker loop
    pub(crate) async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<SchedulerCommand>) {
        tracing::debug!(
            "Capture scheduler worker started for session {}",
            self.session.session_id()
        );

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(SchedulerCommand::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // Every handle dropped
                        self.stop().await;
                        break;
                    }
                },
                Some(done) = self.completion_rx.recv() => self.resolve(done).await,
                _ = wait_until(deadline) => self.on_tick(),
            }
        }

        tracing::debug!("Capture scheduler worker exited");
    }

    async fn handle_command(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Start { reply } => {
                let _ = reply.send(self.start().await);
            }
            SchedulerCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            SchedulerCommand::CaptureOnce { text, reply } => {
                self.capture_once(text, reply).await;
            }
            SchedulerCommand::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        // Only valid from Idle; a manual cycle in flight counts as active
        if self.current_state() != SchedulerState::Idle {
            return Err(ForgeError::AlreadyRunning);
        }

        self.device = Some(self.deps.device.acquire().await?);

        self.running = true;
        self.deadline = Some(Instant::now() + self.session.interval());
        tracing::info!(
            "Capture scheduler started (session {}, interval {}ms)",
            self.session.session_id(),
            self.session.interval_ms()
        );
        self.publish_state();
        Ok(())
    }

    async fn stop(&mut self) {
        let was_busy = self.running || self.active.is_some();
        self.running = false;
        self.deadline = None;

        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            tracing::info!("Cancelled in-flight cycle {}", active.id);
            if let Some(reply) = active.reply {
                let _ = reply.send(Err(ForgeError::Cancelled));
            }
        }

        self.release_device().await;

        if was_busy {
            tracing::info!("Capture scheduler stopped");
        }
        self.publish_state();
    }

    async fn capture_once(
        &mut self,
        text: String,
        reply: oneshot::Sender<Result<AnalysisResult>>,
    ) {
        if self.active.is_some() {
            tracing::debug!("Rejecting manual capture, a cycle is in flight");
            let _ = reply.send(Err(ForgeError::Busy));
            return;
        }

        if self.device.is_none() {
            match self.deps.device.acquire().await {
                Ok(handle) => self.device = Some(handle),
                Err(e) => {
                    let _ = reply.send(Err(e));
                    return;
                }
            }
        }

        self.begin_cycle(TriggerOrigin::Manual, text, Some(reply));
    }

    fn on_tick(&mut self) {
        if !self.running {
            self.deadline = None;
            return;
        }

        // Re-arm from the interval as it is now, not as it was at start
        self.deadline = Some(Instant::now() + self.session.interval());

        if let Some(active) = &self.active {
            tracing::debug!("Tick skipped, cycle {} still in flight", active.id);
            return;
        }

        self.begin_cycle(TriggerOrigin::Automatic, String::new(), None);
    }

    fn begin_cycle(
        &mut self,
        origin: TriggerOrigin,
        text: String,
        reply: Option<oneshot::Sender<Result<AnalysisResult>>>,
    ) {
        let Some(device) = self.device.clone() else {
            if let Some(reply) = reply {
                let _ = reply.send(Err(ForgeError::DeviceUnavailable(
                    "capture device not acquired".to_string(),
                )));
            }
            return;
        };

        self.next_cycle_id += 1;
        let cycle_id = self.next_cycle_id;
        let cancel = CancellationToken::new();

        let deps = self.deps.clone();
        let session_id = self.session.session_id().to_string();
        let completion_tx = self.completion_tx.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = run_cycle(deps, session_id, device, origin, text, token).await;
            let _ = completion_tx.send(CycleCompletion { cycle_id, outcome });
        });

        tracing::debug!("Cycle {} started ({:?})", cycle_id, origin);
        self.active = Some(ActiveCycle {
            id: cycle_id,
            origin,
            cancel,
            reply,
        });
        self.publish_state();
    }

    async fn resolve(&mut self, done: CycleCompletion) {
        let is_current = matches!(&self.active, Some(active) if active.id == done.cycle_id);
        if !is_current {
            tracing::debug!("Discarding outcome of stale cycle {}", done.cycle_id);
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };

        let cycle = CycleRef {
            session_id: self.session.session_id(),
            cycle_id: active.id,
            origin: active.origin,
        };

        match &done.outcome {
            Ok(result) => {
                self.session.set_last_result(result.clone());

                let previous = self.session.interval_ms();
                let applied = self
                    .session
                    .set_interval(self.config.policy.next_interval_ms(result.emotion));
                if applied != previous {
                    self.sink.deliver(RuntimeEvent::IntervalChanged {
                        interval_ms: applied,
                    });
                }

                tracing::info!(
                    "Cycle {} resolved: {} (next capture in {}ms)",
                    active.id,
                    result.emotion,
                    applied
                );
                self.sink.on_result(cycle, result);
            }
            Err(e) => {
                tracing::warn!("Cycle {} failed: {}", active.id, e);
                self.sink.on_failure(cycle, e);
            }
        }

        if self.running {
            self.deadline = Some(Instant::now() + self.session.interval());
        } else {
            // Manual capture while idle: the device was only borrowed
            self.release_device().await;
        }
        self.publish_state();

        if let Some(reply) = active.reply {
            let _ = reply.send(done.outcome);
        }
    }

    async fn release_device(&mut self) {
        if let Some(handle) = self.device.take() {
            self.deps.device.release(handle).await;
        }
    }

    fn current_state(&self) -> SchedulerState {
        match (self.running, self.active.is_some()) {
            (_, true) => SchedulerState::CycleActive,
            (true, false) => SchedulerState::Scheduled,
            (false, false) => SchedulerState::Idle,
        }
    }

    fn publish_state(&self) {
        let state = self.current_state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.sink.deliver(RuntimeEvent::StateChanged { state });
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
