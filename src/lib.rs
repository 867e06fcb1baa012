//! EmotionForge: adaptive camera capture with remote emotion analysis.
//!
//! A [`scheduler::CaptureScheduler`] periodically grabs a frame from a
//! [`capture::CaptureDevice`], submits it to the analysis service through an
//! [`analysis::AnalysisTransport`], and reports each outcome to a
//! [`runtime::ResultSink`]. The next capture interval follows the last
//! detected emotion.

pub mod analysis;
pub mod capture;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod test_support;

pub use error::{ForgeError, Result};
