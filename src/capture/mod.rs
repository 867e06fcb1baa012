//! Capture device abstraction.
//!
//! The scheduler acquires a device when it starts, pulls one frame per cycle
//! and releases the device when it stops. A device is exclusively owned while
//! acquired; a second `acquire` fails with `DeviceUnavailable`.

mod file;

pub use file::FrameSource;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Proof of an acquired device, passed back on every capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle(Uuid);

impl DeviceHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait CaptureDevice: Send + Sync + 'static {
    /// Open the device for exclusive use.
    async fn acquire(&self) -> Result<DeviceHandle>;

    /// Grab one encoded frame.
    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>>;

    /// Give the device back. Releasing a stale handle is a no-op.
    async fn release(&self, handle: DeviceHandle);
}
