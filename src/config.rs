use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Camera settings
    pub camera: CameraConfig,
    /// Storage directory settings
    pub storage: StorageConfig,
    /// Encoder settings
    pub encoder: EncoderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            camera: CameraConfig::default(),
            storage: StorageConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8000,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Video device path (e.g., /dev/video0)
    pub device: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
        }
    }
}

/// Storage directory configuration
///
/// Both directories are created on startup if absent. Filesystem naming is
/// the only persisted state: frames are `capture_<YYYYMMDD_HHMMSS>.jpg`,
/// videos are `timelapse_<YYYYMMDD_HHMMSS>.mp4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding captured frames
    pub captures_dir: PathBuf,
    /// Directory holding assembled videos
    pub videos_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            captures_dir: PathBuf::from("data/captures"),
            videos_dir: PathBuf::from("data/videos"),
        }
    }
}

/// External encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder binary invoked for video assembly
    pub ffmpeg_bin: PathBuf,
    /// Default output frame rate when a request does not supply one
    pub default_fps: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            default_fps: 30,
        }
    }
}
