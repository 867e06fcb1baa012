//! One capture → submit → resolve sequence.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analysis::{
    AnalysisResult, AnalysisTransport, CaptureInput, ResultPoller, SubmissionOutcome,
    TriggerOrigin,
};
use crate::capture::{CaptureDevice, DeviceHandle};
use crate::error::{ForgeError, Result};

/// Collaborators a cycle needs, shared by every cycle of a scheduler.
#[derive(Clone)]
pub(crate) struct CycleDeps {
    pub device: Arc<dyn CaptureDevice>,
    pub transport: Arc<dyn AnalysisTransport>,
    pub poller: Arc<ResultPoller>,
}

/// Outcome of one cycle, reported back to the worker exactly once.
#[derive(Debug)]
pub(crate) struct CycleCompletion {
    pub cycle_id: u64,
    pub outcome: Result<AnalysisResult>,
}

/// Run one cycle to its terminal outcome.
///
/// Every suspension point (capture, submit, poll) observes `cancel`.
pub(crate) async fn run_cycle(
    deps: CycleDeps,
    session_id: String,
    device: DeviceHandle,
    origin: TriggerOrigin,
    text: String,
    cancel: CancellationToken,
) -> Result<AnalysisResult> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ForgeError::Cancelled),
        outcome = execute(&deps, &session_id, &device, origin, text, &cancel) => outcome,
    }
}

async fn execute(
    deps: &CycleDeps,
    session_id: &str,
    device: &DeviceHandle,
    origin: TriggerOrigin,
    text: String,
    cancel: &CancellationToken,
) -> Result<AnalysisResult> {
    let frame = deps.device.capture_frame(device).await?;
    let input = CaptureInput::new(frame, text, origin);

    match deps.transport.submit(session_id, input).await {
        SubmissionOutcome::Immediate(result) => Ok(result),
        SubmissionOutcome::Pending(handle) => {
            tracing::debug!("Submission accepted, polling for session {}", session_id);
            deps.poller.await_result(&handle, cancel).await
        }
        SubmissionOutcome::TransportFailure(reason) => Err(ForgeError::Transport(reason)),
    }
}
