//! Timelapse video assembly
//!
//! Produces MP4 artifacts from the frame store by shelling out to an
//! external encoder (ffmpeg). The core contract is command construction and
//! ordering discipline: the frame list is re-derived, sorted ascending, on
//! every invocation, and passed to the encoder as an explicit concat list.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::storage::{FrameStore, TIMESTAMP_FORMAT};

/// Stderr is captured into the error message; cap it so a chatty encoder
/// does not produce unbounded responses.
const MAX_STDERR_LEN: usize = 2048;

/// One assembled video artifact
#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    pub name: String,
    pub created_at: String,
    pub size_bytes: u64,
}

/// Assembles frames from the store into video artifacts and enumerates
/// existing artifacts
pub struct VideoAssembler {
    store: FrameStore,
    videos_dir: PathBuf,
    ffmpeg_bin: PathBuf,
}

impl VideoAssembler {
    pub fn new(
        store: FrameStore,
        videos_dir: impl Into<PathBuf>,
        ffmpeg_bin: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            videos_dir: videos_dir.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Directory holding the video files
    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Create the videos directory if it does not exist
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.videos_dir).await?;
        Ok(())
    }

    /// Assemble all stored frames into one video at the given frame rate,
    /// returning the new artifact's filename
    ///
    /// Blocks for the duration of the encoder process. The artifact filename
    /// is derived from wall-clock time at assembly start.
    pub async fn create_timelapse(&self, fps: u32) -> Result<String> {
        self.create_timelapse_at(fps, Local::now()).await
    }

    /// Assemble with an explicit assembly timestamp
    pub async fn create_timelapse_at(&self, fps: u32, at: DateTime<Local>) -> Result<String> {
        if fps == 0 {
            return Err(AppError::BadRequest(
                "fps must be a positive number".to_string(),
            ));
        }

        self.ensure_dir().await?;

        let frames = self.store.list_frames().await?;
        if frames.is_empty() {
            return Err(AppError::NoFrames);
        }

        // ffmpeg resolves relative concat entries against the directory
        // containing the list file, not our working directory, so every
        // entry must be an absolute path.
        let frames_dir = tokio::fs::canonicalize(self.store.dir()).await?;
        let frames: Vec<PathBuf> = frames
            .iter()
            .filter_map(|f| f.file_name().map(|n| frames_dir.join(n)))
            .collect();

        let timestamp = at.format(TIMESTAMP_FORMAT);
        let output = self.videos_dir.join(format!("timelapse_{}.mp4", timestamp));
        let list_path = std::env::temp_dir().join(format!("lapsecam_frames_{}.txt", timestamp));
        tokio::fs::write(&list_path, concat_list(&frames)).await?;

        info!(
            "Creating timelapse from {} frames at {} fps: {}",
            frames.len(),
            fps,
            output.display()
        );

        let result = self.run_encoder(&list_path, fps, &output).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result?;

        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Timelapse created: {}", name);
        Ok(name)
    }

    async fn run_encoder(&self, list_path: &Path, fps: u32, output: &Path) -> Result<()> {
        let args = encoder_args(list_path, fps, output);
        let out = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::Encoding(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_bin.display(),
                    e
                ))
            })?;

        if !out.status.success() {
            // Drop any partial output so a failed run leaves no artifact
            let _ = tokio::fs::remove_file(output).await;

            let mut stderr = String::from_utf8_lossy(&out.stderr).into_owned();
            if stderr.len() > MAX_STDERR_LEN {
                // Keep the tail; that is where ffmpeg puts the actual error
                let cut = stderr.len() - MAX_STDERR_LEN;
                let cut = stderr
                    .char_indices()
                    .map(|(i, _)| i)
                    .find(|&i| i >= cut)
                    .unwrap_or(0);
                stderr = stderr[cut..].to_string();
            }
            error!("Encoder exited with {}: {}", out.status, stderr.trim());
            return Err(AppError::Encoding(format!(
                "encoder exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// List all video artifacts, most recent first
    ///
    /// Recomputed from filesystem metadata on every call.
    pub async fn list_videos(&self) -> Result<Vec<VideoInfo>> {
        let mut videos: Vec<(SystemTime, VideoInfo)> = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.videos_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mp4") {
                continue;
            }
            let meta = entry.metadata().await?;
            let created = meta.created().or_else(|_| meta.modified())?;
            videos.push((
                created,
                VideoInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    created_at: DateTime::<Local>::from(created).to_rfc3339(),
                    size_bytes: meta.len(),
                },
            ));
        }

        // Newest first; artifact names embed the assembly timestamp, so the
        // name breaks ties deterministically.
        videos.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.name.cmp(&a.1.name)));
        Ok(videos.into_iter().map(|(_, v)| v).collect())
    }

    /// Live count of video artifacts
    pub async fn video_count(&self) -> Result<usize> {
        Ok(self.list_videos().await?.len())
    }
}

/// Render the encoder's concat input list: one `file` entry per frame, in
/// the order given
///
/// Single quotes in paths are escaped with the `'\''` sequence the concat
/// demuxer expects.
fn concat_list(frames: &[PathBuf]) -> String {
    let mut list = String::new();
    for frame in frames {
        let path = frame.display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", path));
    }
    list
}

/// Encoder arguments: read the concat list at the given input rate, encode
/// H.264 / yuv420p for broad playback compatibility, overwrite the output
fn encoder_args(list_path: &Path, fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        list_path.display().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{tempdir, TempDir};

    fn frame_fixture() -> (TempDir, FrameStore) {
        let dir = tempdir().unwrap();
        let store = FrameStore::new(dir.path());
        (dir, store)
    }

    /// Write an executable stand-in for ffmpeg into `dir`
    fn fake_encoder(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Succeeds and creates its last argument (the output path)
    const ENCODER_OK: &str = "#!/bin/sh\nfor last; do :; done\n: > \"$last\"\nexit 0\n";
    /// Fails with diagnostics on stderr
    const ENCODER_FAIL: &str = "#!/bin/sh\necho 'boom: no such codec' >&2\nexit 1\n";

    #[test]
    fn test_concat_list_preserves_order() {
        let frames = vec![
            PathBuf::from("/c/capture_20240101_000001.jpg"),
            PathBuf::from("/c/capture_20240101_000002.jpg"),
        ];
        assert_eq!(
            concat_list(&frames),
            "file '/c/capture_20240101_000001.jpg'\nfile '/c/capture_20240101_000002.jpg'\n"
        );
    }

    #[test]
    fn test_concat_list_escapes_single_quotes() {
        let frames = vec![PathBuf::from("/c/user's frames/capture_1.jpg")];
        assert_eq!(
            concat_list(&frames),
            "file '/c/user'\\''s frames/capture_1.jpg'\n"
        );
    }

    #[tokio::test]
    async fn test_concat_entries_absolute_with_relative_store_dir() {
        // The store directory is configured as a path relative to the
        // working directory; the list handed to the encoder must still
        // contain absolute, existing paths.
        let rel = PathBuf::from(format!("relative-frames-{}", std::process::id()));
        tokio::fs::create_dir_all(&rel).await.unwrap();
        let store = FrameStore::new(&rel);
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        store.write_frame_at(b"jpeg", at).await.unwrap();

        let videos_dir = tempdir().unwrap();
        let snapshot = videos_dir.path().join("list-snapshot.txt");
        // Snapshots the concat list (the argument after -i), then succeeds
        let script = format!(
            "#!/bin/sh\nprev=\"\"\nfor a; do\n  if [ \"$prev\" = \"-i\" ]; then cp \"$a\" \"{}\"; fi\n  prev=\"$a\"\ndone\nfor last; do :; done\n: > \"$last\"\nexit 0\n",
            snapshot.display()
        );
        let bin = fake_encoder(videos_dir.path(), &script);
        let assembler = VideoAssembler::new(store, videos_dir.path(), bin);
        assembler.create_timelapse(30).await.unwrap();

        let list = tokio::fs::read_to_string(&snapshot).await.unwrap();
        let mut entries = 0;
        for line in list.lines() {
            let path = line
                .strip_prefix("file '")
                .and_then(|l| l.strip_suffix('\''))
                .unwrap_or_else(|| panic!("malformed list entry: {}", line));
            assert!(Path::new(path).is_absolute(), "relative entry: {}", line);
            assert!(Path::new(path).exists(), "missing entry: {}", line);
            entries += 1;
        }
        assert_eq!(entries, 1);

        tokio::fs::remove_dir_all(&rel).await.unwrap();
    }

    #[test]
    fn test_encoder_args_rate_and_output() {
        let args = encoder_args(Path::new("/tmp/list.txt"), 10, Path::new("/v/out.mp4"));
        assert_eq!(
            args,
            vec![
                "-y", "-f", "concat", "-safe", "0", "-r", "10", "-i", "/tmp/list.txt", "-c:v",
                "libx264", "-pix_fmt", "yuv420p", "/v/out.mp4"
            ]
        );
    }

    #[tokio::test]
    async fn test_create_on_empty_store_fails_without_artifact() {
        let (_frames_dir, store) = frame_fixture();
        let videos_dir = tempdir().unwrap();
        let bin = fake_encoder(videos_dir.path(), ENCODER_OK);
        let assembler = VideoAssembler::new(store, videos_dir.path(), bin);

        let err = assembler.create_timelapse(30).await.unwrap_err();
        assert!(matches!(err, AppError::NoFrames));
        assert_eq!(assembler.video_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_zero_fps() {
        let (_frames_dir, store) = frame_fixture();
        let videos_dir = tempdir().unwrap();
        let assembler = VideoAssembler::new(store, videos_dir.path(), "ffmpeg");

        let err = assembler.create_timelapse(0).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_produces_timestamped_artifact() {
        let (_frames_dir, store) = frame_fixture();
        store.write_frame(b"jpeg").await.unwrap();
        let videos_dir = tempdir().unwrap();
        let bin = fake_encoder(videos_dir.path(), ENCODER_OK);
        let assembler = VideoAssembler::new(store, videos_dir.path(), bin);

        let at = Local.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        let name = assembler.create_timelapse_at(30, at).await.unwrap();
        assert_eq!(name, "timelapse_20240601_123000.mp4");
        assert!(videos_dir.path().join(&name).exists());
    }

    #[tokio::test]
    async fn test_two_creates_yield_two_artifacts_newest_first() {
        let (_frames_dir, store) = frame_fixture();
        store.write_frame(b"jpeg").await.unwrap();
        let videos_dir = tempdir().unwrap();
        let bin = fake_encoder(videos_dir.path(), ENCODER_OK);
        let assembler = VideoAssembler::new(store, videos_dir.path(), bin);

        let t1 = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 1).unwrap();
        let first = assembler.create_timelapse_at(30, t1).await.unwrap();
        let second = assembler.create_timelapse_at(30, t2).await.unwrap();
        assert_ne!(first, second);

        let videos = assembler.list_videos().await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].name, second);
        assert_eq!(videos[1].name, first);
    }

    #[tokio::test]
    async fn test_encoder_failure_surfaces_stderr_and_leaves_no_artifact() {
        let (_frames_dir, store) = frame_fixture();
        store.write_frame(b"jpeg").await.unwrap();
        let videos_dir = tempdir().unwrap();
        let bin = fake_encoder(videos_dir.path(), ENCODER_FAIL);
        let assembler = VideoAssembler::new(store, videos_dir.path(), bin);

        let err = assembler.create_timelapse(30).await.unwrap_err();
        match err {
            AppError::Encoding(msg) => assert!(msg.contains("boom"), "stderr missing: {}", msg),
            other => panic!("expected Encoding error, got {:?}", other),
        }
        assert_eq!(assembler.video_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_encoder_binary() {
        let (_frames_dir, store) = frame_fixture();
        store.write_frame(b"jpeg").await.unwrap();
        let videos_dir = tempdir().unwrap();
        let assembler = VideoAssembler::new(
            store,
            videos_dir.path(),
            videos_dir.path().join("does-not-exist"),
        );

        let err = assembler.create_timelapse(30).await.unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));
    }
}
