//! CLI output handling - event receiver loop.
//!
//! Receives scheduler events from the `ChannelSink` and renders them as
//! terminal lines or JSON lines. The loop ends when the sink's sender is
//! swapped out (see `CliContext::park_events`).

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::analysis::{AnalysisResult, TriggerOrigin};
use crate::runtime::RuntimeEvent;

/// How events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// One JSON object per line
    pub json: bool,
    /// Only results and failures
    pub quiet: bool,
    /// Render results/failures of manual captures. The REPL prints those
    /// itself from the `capture_once` return value.
    pub manual_outcomes: bool,
}

impl OutputMode {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self {
            json,
            quiet,
            manual_outcomes: true,
        }
    }

    pub fn without_manual_outcomes(self) -> Self {
        Self {
            manual_outcomes: false,
            ..self
        }
    }
}

/// Run the event loop until every sender is gone.
pub async fn run_event_loop(
    mut event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    mode: OutputMode,
) -> Result<()> {
    while let Some(event) = event_rx.recv().await {
        if !mode.manual_outcomes && is_manual_outcome(&event) {
            continue;
        }
        render_event(&event, mode)?;
    }
    Ok(())
}

fn is_manual_outcome(event: &RuntimeEvent) -> bool {
    matches!(
        event,
        RuntimeEvent::Result {
            origin: TriggerOrigin::Manual,
            ..
        } | RuntimeEvent::Failure {
            origin: TriggerOrigin::Manual,
            ..
        }
    )
}

fn render_event(event: &RuntimeEvent, mode: OutputMode) -> Result<()> {
    if mode.json {
        println!("{}", serde_json::to_string(event)?);
        io::stdout().flush()?;
        return Ok(());
    }

    match event {
        RuntimeEvent::Result {
            emotion,
            response_text,
            origin,
            ..
        } => {
            if mode.quiet {
                println!("{}\t{}", emotion, response_text);
            } else {
                println!(
                    "{} [{}] {}: {}",
                    timestamp(),
                    origin_label(*origin),
                    emotion,
                    response_text
                );
            }
        }
        RuntimeEvent::Failure {
            message,
            error_type,
            origin,
            ..
        } => {
            eprintln!(
                "{} [{}] failed ({}): {}",
                timestamp(),
                origin_label(*origin),
                error_type,
                message
            );
        }
        RuntimeEvent::StateChanged { state } if !mode.quiet => {
            eprintln!("[state] {:?}", state);
        }
        RuntimeEvent::IntervalChanged { interval_ms } if !mode.quiet => {
            eprintln!("[interval] next capture every {}ms", interval_ms);
        }
        _ => {}
    }
    io::stdout().flush()?;
    Ok(())
}

/// Print the outcome of a manual capture returned directly to the caller.
pub fn print_outcome(result: &AnalysisResult, mode: OutputMode) -> Result<()> {
    if mode.json {
        println!("{}", serde_json::to_string(result)?);
    } else if mode.quiet {
        println!("{}\t{}", result.emotion, result.response_text);
    } else {
        println!("{}: {}", result.emotion, result.response_text);
    }
    io::stdout().flush()?;
    Ok(())
}

fn origin_label(origin: TriggerOrigin) -> &'static str {
    match origin {
        TriggerOrigin::Automatic => "auto",
        TriggerOrigin::Manual => "manual",
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Emotion;

    fn result_event(origin: TriggerOrigin) -> RuntimeEvent {
        RuntimeEvent::Result {
            session_id: "s".to_string(),
            cycle_id: 1,
            origin,
            emotion: Emotion::Joy,
            response_text: "nice".to_string(),
        }
    }

    #[test]
    fn test_manual_outcome_detection() {
        assert!(is_manual_outcome(&result_event(TriggerOrigin::Manual)));
        assert!(!is_manual_outcome(&result_event(TriggerOrigin::Automatic)));
        assert!(!is_manual_outcome(&RuntimeEvent::IntervalChanged {
            interval_ms: 1500
        }));
    }

    #[test]
    fn test_output_mode_builders() {
        let mode = OutputMode::new(true, false);
        assert!(mode.manual_outcomes);
        let repl = mode.without_manual_outcomes();
        assert!(repl.json);
        assert!(!repl.manual_outcomes);
    }

    #[tokio::test]
    async fn test_event_loop_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(result_event(TriggerOrigin::Automatic)).unwrap();
        drop(tx);

        run_event_loop(rx, OutputMode::new(false, true)).await.unwrap();
    }
}
