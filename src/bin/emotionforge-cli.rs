//! EmotionForge CLI - headless front-end for the capture scheduler
//!
//! # Usage
//!
//! ```bash
//! # One capture with a message
//! ./target/debug/emotionforge-cli --frames ./frames -e "How do I look?"
//!
//! # Adaptive loop for a minute, JSON lines for scripting
//! ./target/debug/emotionforge-cli --frames ./frames --live --duration 60 --json | jq .
//!
//! # Interactive REPL (when neither -e nor --live is given)
//! ./target/debug/emotionforge-cli --frames ./frames
//!
//! # Reference analysis service (requires the `server` feature)
//! ./target/debug/emotionforge-cli --serve 8000
//! ```

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use emotionforge_lib::cli::{execute_once, initialize, run_live, run_repl, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    #[cfg(feature = "server")]
    if let Some(port) = args.serve {
        return serve(&args, port).await;
    }

    let mut ctx = initialize(&args).await?;

    let result = if let Some(ref text) = args.execute {
        execute_once(&mut ctx, text).await
    } else if args.live {
        run_live(&mut ctx, args.duration.map(Duration::from_secs)).await
    } else {
        run_repl(&mut ctx).await
    };

    ctx.shutdown().await?;

    result
}

#[cfg(feature = "server")]
async fn serve(args: &Args, port: u16) -> Result<()> {
    use std::sync::Arc;

    use emotionforge_lib::cli::prepare;
    use emotionforge_lib::server::{serve_until_ctrl_c, ServerConfig, StaticAnalyzer};

    let (_, settings) = prepare(args).await?;
    serve_until_ctrl_c(
        port,
        ServerConfig::from(&settings.server),
        Arc::new(StaticAnalyzer::default()),
    )
    .await
}
