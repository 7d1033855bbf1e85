use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Settings;
use crate::platform::PlatformAdapter;

use super::frame::{Frame, FrameRing};

/// Cursor position sampled alongside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSample {
    pub x: i32,
    pub y: i32,
    pub timestamp_ms: u64,
}

// Consecutive adapter failures tolerated before the loop pauses.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

// State shared between the owning handle and the producer thread.
struct CaptureShared {
    platform: Arc<dyn PlatformAdapter>,
    settings: Arc<Settings>,
    clock: Clock,
    ring: Arc<FrameRing>,
    frame_counter: AtomicU64,
    running: AtomicBool,
    cursor_tx: Mutex<Option<mpsc::Sender<CursorSample>>>,
}

impl CaptureShared {
    fn capture_once(&self) -> anyhow::Result<Arc<Frame>> {
        let image = self.platform.capture_frame()?;
        let cursor = self.platform.get_cursor_pos()?;
        let t = self.clock.now_ms();
        let n = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let frame = Arc::new(Frame::new(image, t, cursor, n));
        self.ring.push(frame.clone());
        if let Some(tx) = self.cursor_tx.lock().unwrap().as_ref() {
            // Drop on full rather than blocking the producer.
            let _ = tx.try_send(CursorSample {
                x: cursor.0,
                y: cursor.1,
                timestamp_ms: t,
            });
        }
        Ok(frame)
    }
}

/// Continuous frame producer.
///
/// Runs on a dedicated OS thread so image grabbing never blocks the
/// async runtime. Each tick grabs a frame and the cursor position from
/// the platform adapter, stamps them with the shared monotonic clock,
/// and pushes into the bounded ring. Cursor samples are additionally
/// offered to an optional listener channel.
pub struct CaptureLoop {
    shared: Arc<CaptureShared>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl CaptureLoop {
    pub fn new(platform: Arc<dyn PlatformAdapter>, settings: Arc<Settings>, clock: Clock) -> Self {
        let ring = Arc::new(FrameRing::new(settings.ring_capacity()));
        Self {
            shared: Arc::new(CaptureShared {
                platform,
                settings,
                clock,
                ring,
                frame_counter: AtomicU64::new(0),
                running: AtomicBool::new(false),
                cursor_tx: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn ring(&self) -> Arc<FrameRing> {
        self.shared.ring.clone()
    }

    /// Register a listener for cursor samples. Samples are dropped,
    /// not blocked on, when the listener falls behind.
    pub fn set_cursor_listener(&self, tx: mpsc::Sender<CursorSample>) {
        *self.shared.cursor_tx.lock().unwrap() = Some(tx);
    }

    /// Grab one frame immediately, store it in the ring, return it.
    pub fn capture_once(&self) -> anyhow::Result<Arc<Frame>> {
        self.shared.capture_once()
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.shared.ring.latest()
    }

    pub fn range(&self, from_ms: u64, to_ms: u64) -> Vec<Arc<Frame>> {
        self.shared.ring.range(from_ms, to_ms)
    }

    /// Start the producer thread. A second call while running is a no-op.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let shared = self.shared.clone();
        let fps = shared
            .settings
            .target_fps
            .clamp(1, shared.settings.max_fps.max(1));
        let tick = Duration::from_millis(1_000 / fps as u64);
        let backoff = Duration::from_secs_f32(shared.settings.api_backoff_base_seconds.max(0.1));

        let handle = std::thread::spawn(move || {
            info!(fps, "capture loop started");
            let mut consecutive_failures: u32 = 0;
            while shared.running.load(Ordering::SeqCst) {
                match shared.capture_once() {
                    Ok(frame) => {
                        consecutive_failures = 0;
                        debug!(frame = frame.frame_number, "frame captured");
                    }
                    Err(err) => {
                        consecutive_failures += 1;
                        warn!(%err, consecutive_failures, "frame capture failed");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            warn!("pausing capture after repeated failures");
                            std::thread::sleep(backoff);
                            consecutive_failures = 0;
                        }
                    }
                }
                std::thread::sleep(tick);
            }
            info!("capture loop stopped");
        });
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Stop the producer thread and wait for it. Idempotent.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockPlatform;

    fn capture_loop() -> CaptureLoop {
        let platform = Arc::new(MockPlatform::new(64, 48));
        let settings = Arc::new(Settings::default());
        CaptureLoop::new(platform, settings, Clock::new())
    }

    #[test]
    fn capture_once_stamps_and_buffers() {
        let cap = capture_loop();
        let a = cap.capture_once().unwrap();
        let b = cap.capture_once().unwrap();
        assert_eq!(a.frame_number, 0);
        assert_eq!(b.frame_number, 1);
        assert!(b.timestamp_ms >= a.timestamp_ms);
        assert_eq!(cap.ring().len(), 2);
    }

    #[test]
    fn stop_is_idempotent() {
        let cap = capture_loop();
        cap.start();
        cap.stop();
        cap.stop();
        assert!(!cap.is_running());
    }

    #[tokio::test]
    async fn cursor_samples_reach_listener() {
        let cap = capture_loop();
        let (tx, mut rx) = mpsc::channel(8);
        cap.set_cursor_listener(tx);
        cap.capture_once().unwrap();
        let sample = rx.recv().await.unwrap();
        assert_eq!((sample.x, sample.y), (0, 0));
    }
}
