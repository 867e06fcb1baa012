//! CLI bootstrap - wire settings, session, device, transport and scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::filter::Directive;

use crate::analysis::HttpTransport;
use crate::capture::FrameSource;
use crate::runtime::{ChannelSink, RuntimeEvent};
use crate::scheduler::CaptureScheduler;
use crate::session::{default_session_id_path, SessionContext};
use crate::settings::schema::DEFAULT_SERVICE_URL;
use crate::settings::{get_with_env_fallback, ForgeSettings, SettingsManager, SERVICE_URL_ENV};

use super::args::Args;
use super::output::OutputMode;

/// Everything a CLI run mode needs.
pub struct CliContext {
    pub scheduler: CaptureScheduler,

    /// Sink the scheduler reports to; its sender is swapped per run mode
    pub sink: Arc<ChannelSink>,

    pub settings_manager: Arc<SettingsManager>,

    pub args: Args,

    /// Receiver for events emitted while no printer is attached
    _parked_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
}

impl CliContext {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::new(self.args.json, self.args.quiet)
    }

    /// Point the sink at a fresh channel and return its receiver.
    pub fn attach_events(&self) -> mpsc::UnboundedReceiver<RuntimeEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.sink.replace_event_tx(event_tx);
        event_rx
    }

    /// Detach the current printer. Its receiver drains and then closes.
    pub fn park_events(&mut self) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.sink.replace_event_tx(event_tx);
        self._parked_rx = event_rx;
    }

    /// Stop the scheduler, releasing the device.
    pub async fn shutdown(self) -> Result<()> {
        self.scheduler.shutdown().await;
        tracing::debug!("CLI context shut down");
        Ok(())
    }
}

/// Load `.env`, settings, and install the tracing subscriber.
pub async fn prepare(args: &Args) -> Result<(Arc<SettingsManager>, ForgeSettings)> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is normal
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    let settings_manager = Arc::new(
        SettingsManager::new()
            .await
            .context("Failed to initialize settings manager")?,
    );
    let settings = settings_manager.get().await;

    let log_level = if args.verbose {
        "debug"
    } else {
        settings.advanced.log_level.as_str()
    };
    let directive = format!("emotionforge_lib={}", log_level)
        .parse::<Directive>()
        .or_else(|_| "emotionforge_lib=warn".parse::<Directive>())
        .context("Invalid log directive")?;
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .try_init();

    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    if args.verbose {
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
    }

    Ok((settings_manager, settings))
}

/// Initialize the CLI context: session, frame source, transport, scheduler.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    let (settings_manager, settings) = prepare(args).await?;

    let base_url = resolve_service_url(&settings, args);
    let frames = resolve_frames_path(&settings, args)?;

    let session_path = settings
        .capture
        .session_id_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_session_id_path);
    let initial_interval = args
        .interval
        .unwrap_or(settings.scheduler.initial_interval_ms);
    let session = Arc::new(
        SessionContext::load_or_create(
            &session_path,
            initial_interval,
            settings.scheduler.min_interval_ms,
        )
        .await
        .context("Failed to load session id")?,
    );

    if args.verbose {
        eprintln!("[cli] Session: {}", session.session_id());
        eprintln!("[cli] Service: {}", base_url);
        eprintln!("[cli] Frames: {}", frames.display());
        eprintln!("[cli] Interval: {}ms", session.interval_ms());
    }

    let transport = Arc::new(HttpTransport::new(&base_url, settings.request_timeout())?);
    let device = Arc::new(FrameSource::new(frames));
    let (sink, parked_rx) = ChannelSink::channel();
    let sink = Arc::new(sink);

    let scheduler = CaptureScheduler::spawn(
        settings.scheduler_config(),
        session,
        device,
        transport,
        sink.clone(),
    );

    Ok(CliContext {
        scheduler,
        sink,
        settings_manager,
        args: args.clone(),
        _parked_rx: parked_rx,
    })
}

/// CLI flag (or its env var) > settings > `EMOTIONFORGE_SERVICE_URL` > default.
fn resolve_service_url(settings: &ForgeSettings, args: &Args) -> String {
    pick_service_url(
        args.url.as_deref(),
        &settings.service.base_url,
        &[SERVICE_URL_ENV],
    )
}

fn pick_service_url(flag: Option<&str>, configured: &str, env_vars: &[&str]) -> String {
    if let Some(url) = flag.filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    get_with_env_fallback(
        &Some(configured.to_string()),
        env_vars,
        Some(DEFAULT_SERVICE_URL.to_string()),
    )
    .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
}

fn resolve_frames_path(settings: &ForgeSettings, args: &Args) -> Result<PathBuf> {
    if let Some(path) = args.resolve_frames()? {
        return Ok(path);
    }
    settings
        .capture
        .frames_path
        .as_ref()
        .map(PathBuf::from)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No frame source configured. Pass --frames PATH or set \
                 'capture.frames_path' in ~/.emotionforge/settings.toml"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_service_url_flag_wins() {
        let settings = ForgeSettings::default();
        let args = Args::parse_from(["emotionforge-cli", "--url", "http://flag:1"]);
        assert_eq!(resolve_service_url(&settings, &args), "http://flag:1");
    }

    #[test]
    fn test_service_url_from_settings() {
        let mut settings = ForgeSettings::default();
        settings.service.base_url = "http://configured:2".to_string();
        let mut args = Args::parse_from(["emotionforge-cli"]);
        args.url = None;
        assert_eq!(resolve_service_url(&settings, &args), "http://configured:2");
    }

    #[test]
    fn test_service_url_env_used_when_settings_empty() {
        const VAR: &str = "EMOTIONFORGE_TEST_URL_FALLBACK";
        std::env::set_var(VAR, "http://from-env:3");
        assert_eq!(pick_service_url(None, "", &[VAR]), "http://from-env:3");
        // Configured value still beats the environment
        assert_eq!(
            pick_service_url(None, "http://configured:2", &[VAR]),
            "http://configured:2"
        );
        std::env::remove_var(VAR);
    }

    #[test]
    fn test_service_url_defaults_when_nothing_set() {
        assert_eq!(
            pick_service_url(None, "", &["EMOTIONFORGE_TEST_URL_UNSET"]),
            DEFAULT_SERVICE_URL
        );
        assert_eq!(
            pick_service_url(Some(""), "", &["EMOTIONFORGE_TEST_URL_UNSET"]),
            DEFAULT_SERVICE_URL
        );
    }

    #[test]
    fn test_frames_path_required() {
        let settings = ForgeSettings::default();
        let args = Args::parse_from(["emotionforge-cli"]);
        assert!(resolve_frames_path(&settings, &args).is_err());
    }

    #[test]
    fn test_frames_path_from_settings() {
        let mut settings = ForgeSettings::default();
        settings.capture.frames_path = Some("/srv/frames".to_string());
        let args = Args::parse_from(["emotionforge-cli"]);
        assert_eq!(
            resolve_frames_path(&settings, &args).unwrap(),
            PathBuf::from("/srv/frames")
        );
    }
}
