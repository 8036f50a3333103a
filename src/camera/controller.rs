//! Capture controller
//!
//! Owns the camera handle and the periodic capture background task.
//! State machine: Idle -> (start_timelapse) -> Running -> (stop_timelapse
//! or internal capture failure) -> Idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::CameraDevice;
use crate::error::{AppError, Result};
use crate::storage::FrameStore;

/// One periodic-capture run, from start to stop
struct CaptureSession {
    interval_secs: u64,
    running: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Manages the camera lifecycle and the periodic capture task
///
/// At most one session runs at a time. Starting while running is a no-op
/// (the running session keeps its interval); stopping while idle is a no-op.
pub struct CaptureController {
    camera: Arc<Mutex<Box<dyn CameraDevice>>>,
    store: FrameStore,
    session: Mutex<Option<CaptureSession>>,
}

impl CaptureController {
    pub fn new(camera: Box<dyn CameraDevice>, store: FrameStore) -> Self {
        Self {
            camera: Arc::new(Mutex::new(camera)),
            store,
            session: Mutex::new(None),
        }
    }

    /// Open the camera handle if not already open
    pub async fn initialize(&self) -> Result<()> {
        let mut camera = self.camera.lock().await;
        if !camera.is_open() {
            camera.open()?;
        }
        Ok(())
    }

    /// Capture a single photo and return its filename
    ///
    /// Lazily opens the camera. Errors propagate to the caller, unlike
    /// failures inside the periodic loop.
    pub async fn capture_photo(&self) -> Result<String> {
        capture_to_store(&self.camera, &self.store).await
    }

    /// Start periodic capture with the given interval
    ///
    /// No-op if a session is already running; the running session keeps its
    /// original interval.
    pub async fn start_timelapse(&self, interval_secs: u64) -> Result<()> {
        if interval_secs == 0 {
            return Err(AppError::BadRequest(
                "interval must be a positive number of seconds".to_string(),
            ));
        }

        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if current.running.load(Ordering::SeqCst) {
                info!(
                    "Timelapse already running with {}s interval, ignoring start",
                    current.interval_secs
                );
                return Ok(());
            }
            // Previous session ended on its own (capture failure); the
            // worker has already exited.
            session.take();
        }

        let running = Arc::new(AtomicBool::new(true));
        let worker = tokio::spawn(capture_loop(
            self.camera.clone(),
            self.store.clone(),
            running.clone(),
            interval_secs,
        ));

        *session = Some(CaptureSession {
            interval_secs,
            running,
            worker,
        });
        info!("Started timelapse capture with {}s interval", interval_secs);
        Ok(())
    }

    /// Stop the running session and wait for the worker to exit
    ///
    /// The loop only checks the running flag between capture/sleep steps,
    /// so this can block for up to one interval. No-op when idle.
    pub async fn stop_timelapse(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            return Ok(());
        };

        session.running.store(false, Ordering::SeqCst);
        if let Err(e) = session.worker.await {
            warn!("Capture worker ended abnormally: {}", e);
        }
        info!("Stopped timelapse capture");
        Ok(())
    }

    /// Whether a capture session is currently running
    pub async fn is_capturing(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Interval of the running session, if any
    pub async fn current_interval(&self) -> Option<u64> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .map(|s| s.interval_secs)
    }

    /// Stop any running session and close the camera handle
    ///
    /// Called once at process shutdown.
    pub async fn release(&self) -> Result<()> {
        self.stop_timelapse().await?;
        self.camera.lock().await.close();
        Ok(())
    }
}

/// Capture one frame and persist it to the store
async fn capture_to_store(
    camera: &Mutex<Box<dyn CameraDevice>>,
    store: &FrameStore,
) -> Result<String> {
    let data = {
        let mut camera = camera.lock().await;
        if !camera.is_open() {
            camera.open()?;
        }
        camera.read_frame()?
    };
    store.write_frame(&data).await
}

/// Background task body: capture, sleep, repeat until stopped or a capture
/// fails. A failure is terminal for the session; it is logged and flips the
/// running flag so callers observe it via status.
async fn capture_loop(
    camera: Arc<Mutex<Box<dyn CameraDevice>>>,
    store: FrameStore,
    running: Arc<AtomicBool>,
    interval_secs: u64,
) {
    info!("Capture loop started ({}s interval)", interval_secs);
    while running.load(Ordering::SeqCst) {
        if let Err(e) = capture_to_store(&camera, &store).await {
            error!("Error in capture loop: {}", e);
            running.store(false, Ordering::SeqCst);
            break;
        }
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
    info!("Capture loop ended");
}
