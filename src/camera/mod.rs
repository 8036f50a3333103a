//! Camera handling: device access and capture scheduling
//!
//! The physical device sits behind the [`CameraDevice`] trait so tests can
//! substitute a fake for real V4L2 hardware.

mod controller;
mod device;

pub use controller::CaptureController;
pub use device::V4l2Camera;

use bytes::Bytes;

use crate::error::Result;

/// A camera that produces encoded JPEG frames
///
/// Implementations own the underlying device handle. At most one handle is
/// open process-wide: the [`CaptureController`] holds the only instance.
pub trait CameraDevice: Send {
    /// Human-readable device identifier (e.g. the device path)
    fn name(&self) -> String;

    /// Whether the device handle is currently open
    fn is_open(&self) -> bool;

    /// Open the device handle. Idempotent: no-op if already open.
    fn open(&mut self) -> Result<()>;

    /// Read one encoded JPEG frame. The handle must be open.
    fn read_frame(&mut self) -> Result<Bytes>;

    /// Close the device handle. No-op if not open.
    fn close(&mut self);
}
