// Result sink abstraction
//
// The scheduler pushes every state change and terminal outcome through a
// ResultSink. Front-ends (CLI, tests, a future GUI) decide what to do with
// the events; the scheduler never reads anything back.

use serde::Serialize;
use thiserror::Error;

use crate::analysis::{AnalysisResult, Emotion, TriggerOrigin};
use crate::error::ForgeError;
use crate::scheduler::SchedulerState;

mod channel;

pub use channel::ChannelSink;

/// Sink-specific errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Event receiver closed")]
    ReceiverClosed,
}

/// Events emitted by the capture scheduler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A cycle produced an analysis result
    Result {
        session_id: String,
        cycle_id: u64,
        origin: TriggerOrigin,
        emotion: Emotion,
        response_text: String,
    },

    /// A cycle failed; the scheduler keeps running
    Failure {
        session_id: String,
        cycle_id: u64,
        origin: TriggerOrigin,
        message: String,
        error_type: String,
    },

    /// Scheduler moved between Idle / Scheduled / CycleActive
    StateChanged { state: SchedulerState },

    /// The adaptive policy picked a new capture interval
    IntervalChanged { interval_ms: u64 },
}

/// Identifies the cycle an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRef<'a> {
    pub session_id: &'a str,
    pub cycle_id: u64,
    pub origin: TriggerOrigin,
}

/// Receiver of scheduler output.
///
/// Implementors only provide `emit`; `on_result` and `on_failure` build the
/// matching events. Delivery errors are logged and never reach the scheduler.
pub trait ResultSink: Send + Sync + 'static {
    /// Emit an event to the front-end
    ///
    /// # Errors
    /// Returns `RuntimeError::ReceiverClosed` if nobody is listening anymore.
    fn emit(&self, event: RuntimeEvent) -> Result<(), RuntimeError>;

    fn on_result(&self, cycle: CycleRef<'_>, result: &AnalysisResult) {
        self.deliver(RuntimeEvent::Result {
            session_id: cycle.session_id.to_string(),
            cycle_id: cycle.cycle_id,
            origin: cycle.origin,
            emotion: result.emotion,
            response_text: result.response_text.clone(),
        });
    }

    fn on_failure(&self, cycle: CycleRef<'_>, reason: &ForgeError) {
        self.deliver(RuntimeEvent::Failure {
            session_id: cycle.session_id.to_string(),
            cycle_id: cycle.cycle_id,
            origin: cycle.origin,
            message: reason.to_string(),
            error_type: reason.kind().to_string(),
        });
    }

    fn deliver(&self, event: RuntimeEvent) {
        if let Err(e) = self.emit(event) {
            tracing::warn!("Dropping scheduler event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_event_json_shape() {
        let event = RuntimeEvent::Result {
            session_id: "s1".to_string(),
            cycle_id: 3,
            origin: TriggerOrigin::Manual,
            emotion: Emotion::Joy,
            response_text: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["origin"], "manual");
        assert_eq!(json["emotion"], "joy");
    }

    #[test]
    fn test_state_event_json_shape() {
        let event = RuntimeEvent::StateChanged {
            state: SchedulerState::CycleActive,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"], "cycle_active");
    }
}
