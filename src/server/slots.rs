//! Per-session slots for the reference analysis service.
//!
//! Each session id maps to one slot holding the time of its last processing,
//! the last result, and at most one pending (debounced) frame. A newer frame
//! replaces the pending one and cancels its debounce timer. Sessions with
//! nothing pending are dropped by `cleanup_idle` once they outlive the TTL.
//!
//! # Thread Safety
//!
//! - `SlotRegistry` uses `DashMap`; every operation holds one shard lock briefly
//! - Debounce timers are tokio tasks stopped through a `CancellationToken`

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analysis::types::status;
use crate::analysis::{AnalyzeReply, PollReply};

/// Session id used when a request names none.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug)]
struct PendingFrame {
    frame: Vec<u8>,
    message: String,
}

#[derive(Debug, Default)]
struct SessionSlot {
    last_processed: Option<Instant>,
    last_result: Option<AnalyzeReply>,
    pending: Option<PendingFrame>,
    /// A debounced frame was taken and its result is not recorded yet
    processing: bool,
    debounce: Option<CancellationToken>,
}

/// What to do with an incoming frame.
#[derive(Debug)]
pub enum Admission {
    /// Analyse now and answer synchronously
    ProcessNow { frame: Vec<u8>, message: String },
    /// Stored as pending; process it when the token's timer fires
    Debounced(CancellationToken),
}

#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: DashMap<String, SessionSlot>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Decide whether `frame` is processed now or debounced.
    ///
    /// A frame arriving less than `min_interval` after the session's last
    /// processing becomes the pending frame, replacing and cancelling any
    /// earlier one.
    pub fn admit(
        &self,
        session_id: &str,
        frame: Vec<u8>,
        message: String,
        now: Instant,
        min_interval: Duration,
    ) -> Admission {
        let mut slot = self.slots.entry(session_id.to_string()).or_default();

        let too_soon = slot
            .last_processed
            .is_some_and(|last| now.saturating_duration_since(last) < min_interval);

        if let Some(previous) = slot.debounce.take() {
            previous.cancel();
        }

        if too_soon {
            let token = CancellationToken::new();
            slot.pending = Some(PendingFrame { frame, message });
            slot.debounce = Some(token.clone());
            Admission::Debounced(token)
        } else {
            slot.pending = None;
            slot.last_processed = Some(now);
            Admission::ProcessNow { frame, message }
        }
    }

    /// Take the pending frame if `token` still owns it.
    pub fn take_pending(
        &self,
        session_id: &str,
        token: &CancellationToken,
    ) -> Option<(Vec<u8>, String)> {
        let mut slot = self.slots.get_mut(session_id)?;
        if token.is_cancelled() {
            return None;
        }
        slot.debounce = None;
        let pending = slot.pending.take()?;
        slot.processing = true;
        Some((pending.frame, pending.message))
    }

    /// Store the result of a processing.
    pub fn record(&self, session_id: &str, reply: AnalyzeReply, now: Instant) {
        let mut slot = self.slots.entry(session_id.to_string()).or_default();
        slot.last_result = Some(reply);
        slot.last_processed = Some(now);
        slot.processing = false;
    }

    /// Poll answer for `session_id`.
    pub fn poll(&self, session_id: &str) -> PollReply {
        let Some(slot) = self.slots.get(session_id) else {
            return PollReply {
                status: status::NONE.to_string(),
                result: None,
            };
        };

        if slot.pending.is_some() || slot.processing {
            return PollReply {
                status: status::PENDING.to_string(),
                result: None,
            };
        }

        match &slot.last_result {
            Some(result) => PollReply {
                status: status::OK.to_string(),
                result: Some(result.clone()),
            },
            None => PollReply {
                status: status::NONE.to_string(),
                result: None,
            },
        }
    }

    /// Drop sessions with nothing pending whose last processing is older
    /// than `max_idle`. Returns how many were removed.
    pub fn cleanup_idle(&self, now: Instant, max_idle: Duration) -> usize {
        let before = self.slots.len();
        self.slots.retain(|session_id, slot| {
            let busy = slot.pending.is_some() || slot.processing || slot.debounce.is_some();
            let recent = slot
                .last_processed
                .is_some_and(|last| now.saturating_duration_since(last) <= max_idle);
            if busy || recent {
                return true;
            }
            tracing::debug!("Cleaned up idle session: {}", session_id);
            false
        });
        before.saturating_sub(self.slots.len())
    }

    /// Cancel every debounce timer.
    pub fn cancel_all(&self) {
        for slot in self.slots.iter() {
            if let Some(token) = &slot.debounce {
                token.cancel();
            }
        }
    }
}
