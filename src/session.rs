//! Per-session identity and tunable state.
//!
//! The session id is generated once per installation and persisted to
//! `~/.emotionforge/session_id`, so restarting the client keeps the same
//! server-side correlation id. The capture interval and last result are
//! mutated by the scheduler worker and read from anywhere.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::error::Result;

/// Lowest capture interval the session accepts.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 500;

/// Interval used until the first result arrives.
pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 1500;

/// Default location of the persisted session id.
pub fn default_session_id_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".emotionforge")
        .join("session_id")
}

pub struct SessionContext {
    session_id: String,
    capture_interval_ms: AtomicU64,
    min_interval_ms: u64,
    last_result: RwLock<Option<AnalysisResult>>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, initial_interval_ms: u64) -> Self {
        Self::with_min_interval(session_id, initial_interval_ms, DEFAULT_MIN_INTERVAL_MS)
    }

    pub fn with_min_interval(
        session_id: impl Into<String>,
        initial_interval_ms: u64,
        min_interval_ms: u64,
    ) -> Self {
        let min_interval_ms = min_interval_ms.max(1);
        Self {
            session_id: session_id.into(),
            capture_interval_ms: AtomicU64::new(initial_interval_ms.max(min_interval_ms)),
            min_interval_ms,
            last_result: RwLock::new(None),
        }
    }

    /// Load the persisted session id from `path`, creating one if needed.
    pub async fn load_or_create(
        path: &Path,
        initial_interval_ms: u64,
        min_interval_ms: u64,
    ) -> Result<Self> {
        let session_id = load_or_create_session_id(path).await?;
        Ok(Self::with_min_interval(
            session_id,
            initial_interval_ms,
            min_interval_ms,
        ))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn interval_ms(&self) -> u64 {
        self.capture_interval_ms.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms())
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Set the capture interval, clamped to the minimum. Returns the applied value.
    pub fn set_interval(&self, ms: u64) -> u64 {
        let applied = ms.max(self.min_interval_ms);
        if applied != ms {
            tracing::debug!(
                "Capture interval {}ms clamped to {}ms",
                ms,
                self.min_interval_ms
            );
        }
        self.capture_interval_ms.store(applied, Ordering::SeqCst);
        applied
    }

    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.last_result.read().clone()
    }

    pub fn set_last_result(&self, result: AnalysisResult) {
        *self.last_result.write() = Some(result);
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("capture_interval_ms", &self.interval_ms())
            .finish_non_exhaustive()
    }
}

async fn load_or_create_session_id(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(existing) => {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(existing.to_string());
            }
            tracing::warn!("Session id file {:?} is empty, generating a new id", path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let session_id = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &session_id).await?;
    tracing::info!("Created session id {} at {:?}", session_id, path);
    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Emotion;

    #[test]
    fn test_interval_is_clamped_to_minimum() {
        let session = SessionContext::new("s1", 1500);
        assert_eq!(session.set_interval(0), DEFAULT_MIN_INTERVAL_MS);
        assert_eq!(session.set_interval(100), DEFAULT_MIN_INTERVAL_MS);
        assert_eq!(session.interval_ms(), DEFAULT_MIN_INTERVAL_MS);
        assert_eq!(session.set_interval(4000), 4000);
        assert_eq!(session.interval(), Duration::from_millis(4000));
    }

    #[test]
    fn test_initial_interval_respects_minimum() {
        let session = SessionContext::with_min_interval("s1", 200, 750);
        assert_eq!(session.interval_ms(), 750);
    }

    #[test]
    fn test_last_result_is_overwritten() {
        let session = SessionContext::new("s1", 1500);
        assert!(session.last_result().is_none());

        session.set_last_result(AnalysisResult::new(Emotion::Joy, "hi"));
        session.set_last_result(AnalysisResult::new(Emotion::Anger, "calm down"));
        assert_eq!(session.last_result().unwrap().emotion, Emotion::Anger);
    }

    #[tokio::test]
    async fn test_session_id_is_persisted() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("session_id");

        let first = SessionContext::load_or_create(&path, 1500, 500)
            .await
            .unwrap();
        assert!(Uuid::parse_str(first.session_id()).is_ok());

        let second = SessionContext::load_or_create(&path, 1500, 500)
            .await
            .unwrap();
        assert_eq!(first.session_id(), second.session_id());
    }

    #[tokio::test]
    async fn test_empty_session_file_is_regenerated() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("session_id");
        std::fs::write(&path, "  \n").unwrap();

        let session = SessionContext::load_or_create(&path, 1500, 500)
            .await
            .unwrap();
        assert!(!session.session_id().is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            session.session_id()
        );
    }

    #[tokio::test]
    async fn test_unreadable_session_path_is_an_error() {
        let temp = tempfile::tempdir().unwrap();

        // A directory where the id file should be is not silently replaced
        let err = SessionContext::load_or_create(temp.path(), 1500, 500)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(temp.path().is_dir());
    }
}
