//! Scripted collaborators shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::analysis::{
    AnalysisResult, AnalysisTransport, CaptureInput, Emotion, JobHandle, PollStatus,
    SubmissionOutcome,
};
use crate::capture::{CaptureDevice, DeviceHandle};
use crate::error::{ForgeError, Result};

/// Transport that replays queued outcomes.
///
/// Unscripted submissions answer `Immediate(neutral)`, unscripted polls
/// answer `NotReady`.
#[derive(Default)]
pub struct ScriptedTransport {
    submissions: Mutex<VecDeque<SubmissionOutcome>>,
    polls: Mutex<VecDeque<Result<PollStatus>>>,
    submit_latency: Mutex<Duration>,
    query_latency: Mutex<Duration>,
    inputs: Mutex<Vec<CaptureInput>>,
    submit_count: AtomicUsize,
    query_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_latency(latency: Duration) -> Self {
        let transport = Self::default();
        *transport.submit_latency.lock() = latency;
        transport
    }

    /// Make every poll query take `latency` before answering.
    pub fn set_query_latency(&self, latency: Duration) {
        *self.query_latency.lock() = latency;
    }

    pub fn push_submission(&self, outcome: SubmissionOutcome) {
        self.submissions.lock().push_back(outcome);
    }

    pub fn push_poll(&self, status: Result<PollStatus>) {
        self.polls.lock().push_back(status);
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted_texts(&self) -> Vec<String> {
        self.inputs.lock().iter().map(|i| i.text.clone()).collect()
    }
}

/// Decrements the in-flight counter even when the submit future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn submit(&self, _session_id: &str, input: CaptureInput) -> SubmissionOutcome {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.inputs.lock().push(input);

        let latency = *self.submit_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.submissions
            .lock()
            .pop_front()
            .unwrap_or_else(|| SubmissionOutcome::Immediate(AnalysisResult::new(Emotion::Neutral, "ok")))
    }

    async fn query(&self, _handle: &JobHandle) -> Result<PollStatus> {
        self.query_count.fetch_add(1, Ordering::SeqCst);

        let latency = *self.query_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.polls
            .lock()
            .pop_front()
            .unwrap_or(Ok(PollStatus::NotReady))
    }
}

/// In-memory capture device.
#[derive(Default)]
pub struct FakeDevice {
    held: Mutex<Option<DeviceHandle>>,
    unavailable: AtomicBool,
    fail_captures: AtomicBool,
    acquire_count: AtomicUsize,
    release_count: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_fail_captures(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.held.lock().is_some()
    }

    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn acquire(&self) -> Result<DeviceHandle> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ForgeError::DeviceUnavailable("camera not ready".to_string()));
        }
        let mut held = self.held.lock();
        if held.is_some() {
            return Err(ForgeError::DeviceUnavailable("camera in use".to_string()));
        }
        let handle = DeviceHandle::new();
        *held = Some(handle.clone());
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>> {
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(ForgeError::DeviceUnavailable("frame grab failed".to_string()));
        }
        if self.held.lock().as_ref() != Some(handle) {
            return Err(ForgeError::DeviceUnavailable("camera not acquired".to_string()));
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    async fn release(&self, handle: DeviceHandle) {
        let mut held = self.held.lock();
        if held.as_ref() == Some(&handle) {
            *held = None;
            self.release_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
