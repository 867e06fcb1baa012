//! File-backed capture device.
//!
//! Serves frames from a single image file, or rotates through the images of
//! a directory in name order. Used by the CLI in place of a camera.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CaptureDevice, DeviceHandle};
use crate::error::{ForgeError, Result};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

struct Acquired {
    handle: DeviceHandle,
    frames: Vec<PathBuf>,
    cursor: usize,
}

pub struct FrameSource {
    path: PathBuf,
    acquired: Mutex<Option<Acquired>>,
}

impl FrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            acquired: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.lock().is_some()
    }

    async fn list_frames(&self) -> Result<Vec<PathBuf>> {
        let unavailable = |e: std::io::Error| {
            ForgeError::DeviceUnavailable(format!("cannot read {}: {}", self.path.display(), e))
        };

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForgeError::DeviceUnavailable(format!(
                    "frame source {} does not exist",
                    self.path.display()
                )));
            }
            Err(e) => return Err(unavailable(e)),
        };

        if metadata.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let mut entries = tokio::fs::read_dir(&self.path).await.map_err(unavailable)?;
        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            // Follows symlinks
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file && is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(ForgeError::DeviceUnavailable(format!(
                "no image frames found in {}",
                self.path.display()
            )));
        }
        Ok(frames)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl CaptureDevice for FrameSource {
    async fn acquire(&self) -> Result<DeviceHandle> {
        let frames = self.list_frames().await?;

        let mut acquired = self.acquired.lock();
        if acquired.is_some() {
            return Err(ForgeError::DeviceUnavailable(
                "frame source is already in use".to_string(),
            ));
        }

        let handle = DeviceHandle::new();
        tracing::debug!(
            "Acquired frame source {} ({} frame(s))",
            self.path.display(),
            frames.len()
        );
        *acquired = Some(Acquired {
            handle: handle.clone(),
            frames,
            cursor: 0,
        });
        Ok(handle)
    }

    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>> {
        let next = {
            let mut acquired = self.acquired.lock();
            match acquired.as_mut() {
                Some(state) if &state.handle == handle => {
                    let path = state.frames[state.cursor % state.frames.len()].clone();
                    state.cursor = state.cursor.wrapping_add(1);
                    path
                }
                _ => {
                    return Err(ForgeError::DeviceUnavailable(
                        "frame source is not acquired by this handle".to_string(),
                    ))
                }
            }
        };

        let frame = tokio::fs::read(&next).await.map_err(|e| {
            ForgeError::DeviceUnavailable(format!("failed to read {}: {}", next.display(), e))
        })?;
        if frame.is_empty() {
            return Err(ForgeError::DeviceUnavailable(format!(
                "frame {} is empty",
                next.display()
            )));
        }
        Ok(frame)
    }

    async fn release(&self, handle: DeviceHandle) {
        let mut acquired = self.acquired.lock();
        if acquired.as_ref().map(|a| a.handle == handle).unwrap_or(false) {
            *acquired = None;
            tracing::debug!("Released frame source {}", self.path.display());
        }
    }
}
