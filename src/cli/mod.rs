//! CLI front-end for the capture scheduler.
//!
//! The scheduler reports through a `ChannelSink`; each run mode attaches a
//! printer to the sink's channel for as long as it runs.
//!
//! ```text
//! +--------------------+     +-------------+     +---------------+
//! | CaptureScheduler   | --> | ChannelSink | --> | output.rs     |
//! | (worker + cycles)  |     | (emit())    |     | (print/JSON)  |
//! +--------------------+     +-------------+     +---------------+
//! ```
//!
//! # Modes
//!
//! - `-e TEXT`: one manual capture, then exit
//! - `--live`: adaptive loop until Ctrl-C or `--duration`
//! - otherwise the REPL (see `repl.rs`)

mod args;
mod bootstrap;
mod output;
mod repl;
mod runner;

pub use args::Args;
pub use bootstrap::{initialize, prepare, CliContext};
pub use output::{run_event_loop, OutputMode};
pub use repl::{run_repl, ReplCommand};
pub use runner::{execute_once, run_live};
