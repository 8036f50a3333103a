//! V4L2 camera backend
//!
//! Opens the device lazily, negotiates MJPG so captured buffers are already
//! JPEG-encoded, and grabs single frames from a short-lived mmap stream.

use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::CameraDevice;
use crate::error::{AppError, Result};

/// Minimum valid frame size (bytes)
const MIN_FRAME_SIZE: usize = 128;

/// Capture buffers for the per-read stream
const BUFFER_COUNT: u32 = 2;

/// V4L2-backed camera
pub struct V4l2Camera {
    path: PathBuf,
    device: Option<Device>,
}

impl V4l2Camera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            device: None,
        }
    }
}

impl CameraDevice for V4l2Camera {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn open(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let device = Device::with_path(&self.path).map_err(|e| {
            AppError::Device(format!("failed to open {}: {}", self.path.display(), e))
        })?;

        let mut fmt = device.format().map_err(|e| {
            AppError::Device(format!("failed to query format on {}: {}", self.path.display(), e))
        })?;
        fmt.fourcc = FourCC::new(b"MJPG");
        let actual = device.set_format(&fmt).map_err(|e| {
            AppError::Device(format!("failed to set format on {}: {}", self.path.display(), e))
        })?;
        if actual.fourcc != FourCC::new(b"MJPG") {
            return Err(AppError::Device(format!(
                "{} does not support MJPG capture (got {})",
                self.path.display(),
                actual.fourcc
            )));
        }

        info!(
            "Camera initialized: {} ({}x{} MJPG)",
            self.path.display(),
            actual.width,
            actual.height
        );
        self.device = Some(device);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Bytes> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AppError::Capture("camera is not open".to_string()))?;

        let mut stream =
            MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT).map_err(|e| {
                AppError::Capture(format!("failed to start capture stream: {}", e))
            })?;

        // The first dequeued buffer can be stale sensor data; take the second.
        stream
            .next()
            .map_err(|e| AppError::Capture(format!("failed to read frame: {}", e)))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| AppError::Capture(format!("failed to read frame: {}", e)))?;

        let used = (meta.bytesused as usize).min(buf.len());
        if used < MIN_FRAME_SIZE {
            return Err(AppError::Capture(format!(
                "truncated frame ({} bytes)",
                used
            )));
        }

        let data = Bytes::copy_from_slice(&buf[..used]);
        let header = turbojpeg::read_header(&data)
            .map_err(|e| AppError::Capture(format!("frame is not valid JPEG: {}", e)))?;
        debug!("Captured {}x{} JPEG frame, {} bytes", header.width, header.height, used);

        Ok(data)
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            info!("Camera released: {}", self.path.display());
        }
    }
}
