//! CLI argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// EmotionForge CLI - adaptive camera capture with remote emotion analysis
#[derive(Parser, Debug, Clone)]
#[command(name = "emotionforge-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Image file or directory of frames to capture from (overrides settings)
    #[arg(long)]
    pub frames: Option<PathBuf>,

    /// Analysis service base URL (overrides settings)
    #[arg(long, env = "EMOTIONFORGE_SERVICE_URL")]
    pub url: Option<String>,

    /// Capture one frame with this message and exit
    #[arg(short = 'e', long, conflicts_with = "live")]
    pub execute: Option<String>,

    /// Run the adaptive capture loop until Ctrl-C
    #[arg(long)]
    pub live: bool,

    /// Stop the live loop after this many seconds
    #[arg(long, requires = "live")]
    pub duration: Option<u64>,

    /// Initial capture interval in milliseconds (overrides settings)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Output events as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only output analysis results
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Run the reference analysis service on this port
    #[cfg(feature = "server")]
    #[arg(long, conflicts_with_all = ["execute", "live"])]
    pub serve: Option<u16>,
}

impl Args {
    /// Make sure the frame path, if given, exists.
    pub fn resolve_frames(&self) -> anyhow::Result<Option<PathBuf>> {
        let Some(frames) = &self.frames else {
            return Ok(None);
        };

        let canonical = frames.canonicalize().map_err(|e| {
            anyhow::anyhow!(
                "Frames path '{}' does not exist or is not accessible: {}",
                frames.display(),
                e
            )
        })?;
        Ok(Some(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["emotionforge-cli"]);
        assert!(args.frames.is_none());
        assert!(args.execute.is_none());
        assert!(!args.live);
        assert!(!args.json);
        assert!(!args.quiet);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_execute_flag() {
        let args = Args::parse_from(["emotionforge-cli", "-e", "how do I look?"]);
        assert_eq!(args.execute, Some("how do I look?".to_string()));
    }

    #[test]
    fn test_args_live_with_duration() {
        let args = Args::parse_from(["emotionforge-cli", "--live", "--duration", "30"]);
        assert!(args.live);
        assert_eq!(args.duration, Some(30));
    }

    #[test]
    fn test_args_duration_requires_live() {
        assert!(Args::try_parse_from(["emotionforge-cli", "--duration", "30"]).is_err());
    }

    #[test]
    fn test_args_execute_conflicts_with_live() {
        assert!(Args::try_parse_from(["emotionforge-cli", "--live", "-e", "hi"]).is_err());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "emotionforge-cli",
            "--url",
            "http://127.0.0.1:9000",
            "--frames",
            "/tmp/frames",
            "--interval",
            "2000",
        ]);
        assert_eq!(args.url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(args.frames, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(args.interval, Some(2000));
    }

    #[test]
    fn test_resolve_frames_missing_path() {
        let args = Args::parse_from(["emotionforge-cli", "--frames", "/nonexistent/frames/xyz"]);
        assert!(args.resolve_frames().is_err());
    }
}
