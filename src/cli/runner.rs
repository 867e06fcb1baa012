//! CLI execution runner.
//!
//! Each run mode attaches a fresh event printer to the scheduler's sink,
//! drives the scheduler, then parks the sink so the printer drains and exits.

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

use super::bootstrap::CliContext;
use super::output::{run_event_loop, OutputMode};

/// Capture one frame with `text` and print the outcome.
pub async fn execute_once(ctx: &mut CliContext, text: &str) -> Result<()> {
    let printer = spawn_printer(ctx, ctx.output_mode());

    let result = ctx.scheduler.capture_once(text).await;

    ctx.park_events();
    join_printer(printer).await;

    result.map(|_| ()).map_err(Into::into)
}

/// Run the adaptive capture loop until Ctrl-C or `duration` elapses.
pub async fn run_live(ctx: &mut CliContext, duration: Option<Duration>) -> Result<()> {
    let printer = spawn_printer(ctx, ctx.output_mode());

    if let Err(e) = ctx.scheduler.start().await {
        ctx.park_events();
        join_printer(printer).await;
        return Err(e.into());
    }

    if !ctx.args.quiet && !ctx.args.json {
        eprintln!(
            "[live] Capturing every {}ms, press Ctrl-C to stop",
            ctx.scheduler.current_interval().as_millis()
        );
    }

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("Ctrl-C received, stopping live capture");
        }
        _ = deadline => {
            tracing::debug!("Live capture duration elapsed");
        }
    }

    ctx.scheduler.stop().await?;
    ctx.park_events();
    join_printer(printer).await;
    Ok(())
}

fn spawn_printer(ctx: &CliContext, mode: OutputMode) -> JoinHandle<Result<()>> {
    let event_rx = ctx.attach_events();
    tokio::spawn(async move { run_event_loop(event_rx, mode).await })
}

pub(super) async fn join_printer(printer: JoinHandle<Result<()>>) {
    match printer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!("Output handler error: {}", e);
        }
        Err(e) => {
            tracing::warn!("Output handler panicked: {}", e);
        }
    }
}
