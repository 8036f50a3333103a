//! Frame store
//!
//! A directory of captured still images whose filenames are derived from
//! the capture timestamp, so lexicographic order equals capture-time order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;

/// Timestamp format shared by frame and video filenames
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Store for captured frames, backed by a single directory
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the frame files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if it does not exist
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Filename for a frame captured at the given time (second resolution)
    pub fn frame_filename(at: DateTime<Local>) -> String {
        format!("capture_{}.jpg", at.format(TIMESTAMP_FORMAT))
    }

    /// Write one encoded frame under a timestamp-derived name, returning
    /// the filename.
    ///
    /// Filenames have second resolution; two writes within the same second
    /// overwrite silently.
    pub async fn write_frame(&self, data: &[u8]) -> Result<String> {
        self.write_frame_at(data, Local::now()).await
    }

    /// Write one encoded frame with an explicit capture time
    pub async fn write_frame_at(&self, data: &[u8], at: DateTime<Local>) -> Result<String> {
        let filename = Self::frame_filename(at);
        tokio::fs::write(self.dir.join(&filename), data).await?;
        tracing::info!("Captured photo: {}", filename);
        Ok(filename)
    }

    /// List all frame files sorted ascending by filename, which equals
    /// ascending capture time given the naming scheme. Re-read from the
    /// filesystem on every call.
    pub async fn list_frames(&self) -> Result<Vec<PathBuf>> {
        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }

    /// Live count of stored frames
    pub async fn frame_count(&self) -> Result<usize> {
        Ok(self.list_frames().await?.len())
    }
}
