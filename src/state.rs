use std::sync::Arc;

use crate::camera::CaptureController;
use crate::config::AppConfig;
use crate::storage::FrameStore;
use crate::timelapse::VideoAssembler;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Resolved configuration
    pub config: AppConfig,
    /// Frame store (captures directory)
    pub store: FrameStore,
    /// Capture controller - owns the camera handle and the capture session
    pub capture: Arc<CaptureController>,
    /// Video assembler
    pub assembler: Arc<VideoAssembler>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: FrameStore,
        capture: Arc<CaptureController>,
        assembler: Arc<VideoAssembler>,
    ) -> Self {
        Self {
            config,
            store,
            capture,
            assembler,
        }
    }
}
