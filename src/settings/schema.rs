//! Settings schema definitions for EmotionForge configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::analysis::PollerConfig;
use crate::scheduler::{IntervalPolicy, SchedulerConfig};
use std::time::Duration;

/// Root settings structure.
///
/// Loaded from `~/.emotionforge/settings.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Remote analysis service
    pub service: ServiceSettings,

    /// Capture timing
    pub scheduler: SchedulerSettings,

    /// Result polling for accepted submissions
    pub polling: PollingSettings,

    /// Frame source
    pub capture: CaptureSettings,

    /// Reference analysis service (server feature)
    pub server: ServerSettings,

    /// Advanced/debug settings
    pub advanced: AdvancedSettings,
}

/// Service URL used when neither settings nor environment name one.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Remote analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Base URL of the analysis service (supports $ENV_VAR syntax).
    /// Empty means `EMOTIONFORGE_SERVICE_URL`, then [`DEFAULT_SERVICE_URL`].
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Capture timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Interval before the first result arrives
    pub initial_interval_ms: u64,

    /// Interval after a neutral result
    pub neutral_interval_ms: u64,

    /// Interval after any other emotion
    pub active_interval_ms: u64,

    /// Lower bound for any interval
    pub min_interval_ms: u64,
}

/// Poll settings for accepted-then-poll submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Fixed delay between poll attempts
    pub delay_ms: u64,

    /// Attempts before giving up (0 = poll until stopped)
    pub max_attempts: u32,
}

/// Frame source settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaptureSettings {
    /// Image file or directory of frames (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_path: Option<String>,

    /// Override for the persisted session id file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id_path: Option<String>,
}

/// Reference analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Frames arriving sooner than this after the last processing are debounced
    pub min_process_interval_ms: u64,

    /// Delay before a debounced frame is processed
    pub debounce_ms: u64,

    /// Idle sessions are dropped after this many seconds
    pub session_ttl_secs: u64,
}

/// Advanced/debug settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Log level: "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSettings::default(),
            scheduler: SchedulerSettings::default(),
            polling: PollingSettings::default(),
            capture: CaptureSettings::default(),
            server: ServerSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: 15,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: crate::session::DEFAULT_INITIAL_INTERVAL_MS,
            neutral_interval_ms: crate::scheduler::policy::DEFAULT_NEUTRAL_INTERVAL_MS,
            active_interval_ms: crate::scheduler::policy::DEFAULT_ACTIVE_INTERVAL_MS,
            min_interval_ms: crate::session::DEFAULT_MIN_INTERVAL_MS,
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            delay_ms: 700,
            max_attempts: crate::analysis::poller::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            min_process_interval_ms: 1200,
            debounce_ms: 1000,
            session_ttl_secs: 30 * 60,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

impl ForgeSettings {
    /// Scheduler configuration derived from these settings.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            policy: IntervalPolicy {
                neutral_interval_ms: self.scheduler.neutral_interval_ms,
                active_interval_ms: self.scheduler.active_interval_ms,
            },
            poller: PollerConfig {
                delay: Duration::from_millis(self.polling.delay_ms),
                max_attempts: match self.polling.max_attempts {
                    0 => None,
                    n => Some(n),
                },
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs.max(1))
    }
}
