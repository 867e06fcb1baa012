//! TOML-based settings.
//!
//! Settings are loaded from `~/.emotionforge/settings.toml` with environment
//! variable interpolation. When `service.base_url` is empty,
//! `EMOTIONFORGE_SERVICE_URL` is consulted through [`get_with_env_fallback`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use emotionforge_lib::settings::schema::DEFAULT_SERVICE_URL;
//! use emotionforge_lib::settings::{get_with_env_fallback, SettingsManager, SERVICE_URL_ENV};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let base_url = get_with_env_fallback(
//!     &Some(settings.service.base_url.clone()),
//!     &[SERVICE_URL_ENV],
//!     Some(DEFAULT_SERVICE_URL.to_string()),
//! );
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager, SERVICE_URL_ENV};
pub use schema::ForgeSettings;
