use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("No result for session {session_id} after {attempts} poll attempts")]
    PollTimeout { session_id: String, attempts: u32 },

    #[error("Capture scheduler is already running")]
    AlreadyRunning,

    #[error("A capture cycle is already in flight")]
    Busy,

    #[error("Capture cycle cancelled")]
    Cancelled,

    #[error("Capture scheduler has shut down")]
    SchedulerClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Stable tag for the error variant, used in failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            ForgeError::DeviceUnavailable(_) => "device_unavailable",
            ForgeError::Transport(_) => "transport_failure",
            ForgeError::PollTimeout { .. } => "poll_timeout",
            ForgeError::AlreadyRunning => "already_running",
            ForgeError::Busy => "busy",
            ForgeError::Cancelled => "cancelled",
            ForgeError::SchedulerClosed => "scheduler_closed",
            ForgeError::Io(_) => "io",
        }
    }
}

// Events and CLI JSON output carry errors as plain strings
impl Serialize for ForgeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
