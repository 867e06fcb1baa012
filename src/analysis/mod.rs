//! Remote analysis: submission, response-mode unification and polling.
//!
//! The service answers a submission in one of two ways. It either analyses
//! the frame straight away (`200 {"status":"ok",...}`) or accepts it for
//! later processing (`202`), in which case the client polls by session id.
//! Both paths end in a single [`AnalysisResult`] or a failure.

pub mod poller;
pub mod transport;
pub mod types;

pub use poller::{PollerConfig, ResultPoller};
pub use transport::{AnalysisTransport, HttpTransport, SESSION_HEADER};
pub use types::{
    AnalysisResult, AnalyzeReply, CaptureInput, Emotion, JobHandle, PollReply, PollStatus,
    SubmissionOutcome, TriggerOrigin,
};
