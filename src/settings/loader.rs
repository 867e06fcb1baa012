//! Settings loading, saving, and environment variable interpolation.
//!
//! The `SettingsManager` handles:
//! - Loading settings from `~/.emotionforge/settings.toml`
//! - Resolving `$VAR` and `${VAR}` references in string fields
//! - Atomic writes (temp file + rename)
//! - First-run template generation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::ForgeSettings;

/// Embedded template for first-run generation.
const TEMPLATE: &str = include_str!("template.toml");

/// Environment variable consulted when `service.base_url` is left empty.
pub const SERVICE_URL_ENV: &str = "EMOTIONFORGE_SERVICE_URL";

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".emotionforge")
        .join("settings.toml")
}

/// Manages settings loading, interpolation, and persistence.
pub struct SettingsManager {
    /// Cached settings (with env vars resolved)
    settings: RwLock<ForgeSettings>,

    path: PathBuf,
}

impl SettingsManager {
    /// Load from the default location.
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    /// Load from `path`. A missing file yields defaults.
    pub async fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = load_from_path(&path).await?;
        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    /// Get the current settings (read-only).
    pub async fn get(&self) -> ForgeSettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings and persist them.
    pub async fn update(&self, new_settings: ForgeSettings) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(&new_settings).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, &toml_string).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        *self.settings.write().await = new_settings;
        tracing::info!("Saved settings to {:?}", self.path);
        Ok(())
    }

    /// Look up a setting by dot-notation key (e.g. `"scheduler.neutral_interval_ms"`).
    pub async fn get_value(&self, key: &str) -> Result<serde_json::Value> {
        let settings = self.settings.read().await;
        let json = serde_json::to_value(&*settings)?;

        key.split('.')
            .try_fold(&json, |node, part| node.get(part))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Setting '{}' not found", key))
    }

    /// Set a setting by dot-notation key and persist.
    pub async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut json = serde_json::to_value(self.get().await)?;

        let parts: Vec<&str> = key.split('.').collect();
        set_nested_value(&mut json, &parts, value)?;

        let updated: ForgeSettings = serde_json::from_value(json)
            .with_context(|| format!("Invalid value for setting '{}'", key))?;
        self.update(updated).await
    }

    /// Write the commented template if no settings file exists yet.
    ///
    /// Returns `true` if a new file was created.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("Generated settings template at {:?}", self.path);
        Ok(true)
    }

    /// Re-read the settings file.
    pub async fn reload(&self) -> Result<()> {
        let settings = load_from_path(&self.path).await?;
        *self.settings.write().await = settings;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn load_from_path(path: &Path) -> Result<ForgeSettings> {
    if !path.exists() {
        tracing::debug!("Settings file not found at {:?}, using defaults", path);
        return Ok(ForgeSettings::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read settings file")?;

    let mut settings: ForgeSettings =
        toml::from_str(&contents).context("Failed to deserialize settings")?;
    resolve_env_vars(&mut settings);

    tracing::info!("Loaded settings from {:?}", path);
    Ok(settings)
}

fn resolve_env_vars(settings: &mut ForgeSettings) {
    if let Some(resolved) = resolve_env_ref(&settings.service.base_url) {
        settings.service.base_url = resolved;
    }

    for value in [
        &mut settings.capture.frames_path,
        &mut settings.capture.session_id_path,
    ]
    .into_iter()
    .flatten()
    {
        if let Some(resolved) = resolve_env_ref(value) {
            *value = resolved;
        }
    }
}

fn set_nested_value(
    json: &mut serde_json::Value,
    parts: &[&str],
    value: serde_json::Value,
) -> Result<()> {
    let Some((last, parents)) = parts.split_last() else {
        return Err(anyhow::anyhow!("Empty key path"));
    };

    let mut current = json;
    for part in parents {
        current = current
            .get_mut(*part)
            .ok_or_else(|| anyhow::anyhow!("Setting path '{}' not found", parts.join(".")))?;
    }

    let obj = current
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Cannot set value on non-object"))?;
    obj.insert((*last).to_string(), value);
    Ok(())
}

/// Resolve a `$ENV_VAR` or `${ENV_VAR}` reference.
///
/// Returns `None` when the value is not a reference or the variable is unset.
fn resolve_env_ref(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let name = trimmed.strip_prefix('$')?;
    let name = name
        .strip_prefix('{')
        .and_then(|n| n.strip_suffix('}'))
        .unwrap_or(name);
    std::env::var(name).ok()
}

/// Get a setting value with environment variable fallback.
///
/// Priority order:
/// 1. Settings value (if set and non-empty)
/// 2. Environment variable (first match from list)
/// 3. Default value
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    if let Some(v) = setting.as_ref().filter(|v| !v.is_empty()) {
        return Some(v.clone());
    }

    env_vars
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.is_empty())
        .or(default)
}
