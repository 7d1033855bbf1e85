use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::brush::{ActionExecutor, BrushController, MotionPlanner, ZoneTracker};
use crate::capture::CaptureLoop;
use crate::clock::Clock;
use crate::config::Settings;
use crate::director::{Director, StepExecutor, TaskPlanner, TaskResult};
use crate::llm::LlmTransport;
use crate::perception::{CanvasMapper, VisionAnalyzer};
use crate::platform::PlatformAdapter;
use crate::registry::ZoneRegistry;
use crate::replay::SessionRecorder;

/// Fully wired agent. Build with [`build_agent`], then `startup`,
/// `run_task` any number of times, and `shutdown`.
pub struct Agent {
    settings: Arc<Settings>,
    platform: Arc<dyn PlatformAdapter>,
    registry: Arc<ZoneRegistry>,
    capture: Arc<CaptureLoop>,
    mapper: Arc<CanvasMapper>,
    tracker: Arc<Mutex<ZoneTracker>>,
    director: Director,
    recorder: SessionRecorder,
    cursor_feed: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Create every component in dependency order and wire them together.
pub fn build_agent(
    platform: Arc<dyn PlatformAdapter>,
    transport: Arc<dyn LlmTransport>,
    settings: Settings,
) -> Agent {
    let settings = Arc::new(settings);
    let clock = Clock::new();

    let registry = Arc::new(ZoneRegistry::new());
    let capture = Arc::new(CaptureLoop::new(platform.clone(), settings.clone(), clock));

    let vision = VisionAnalyzer::new(transport.clone(), settings.clone(), clock);
    let mapper = Arc::new(CanvasMapper::new(
        settings.clone(),
        registry.clone(),
        vision,
        capture.clone(),
        clock,
    ));

    let tracker = Arc::new(Mutex::new(ZoneTracker::new(
        registry.clone(),
        settings.clone(),
    )));
    let motion = MotionPlanner::new(settings.clone());
    let action_executor = ActionExecutor::new(platform.clone(), registry.clone());
    let brush = Arc::new(BrushController::new(
        platform.clone(),
        registry.clone(),
        tracker.clone(),
        motion,
        action_executor,
        clock,
    ));

    let step_executor = StepExecutor::new(brush, platform.clone(), clock);
    let platform_name = if settings.platform_name.is_empty() {
        platform.name().to_string()
    } else {
        settings.platform_name.clone()
    };
    let planner = TaskPlanner::new(transport, settings.clone(), platform_name);

    let director = Director::new(
        planner,
        step_executor,
        registry.clone(),
        mapper.clone(),
        platform.clone(),
        settings.clone(),
    );

    let recorder = SessionRecorder::new(settings.clone());

    Agent {
        settings,
        platform,
        registry,
        capture,
        mapper,
        tracker,
        director,
        recorder,
        cursor_feed: Mutex::new(None),
    }
}

impl Agent {
    /// Start the capture loop and populate the registry with one
    /// initial vision pass. Must complete before any `run_task`.
    pub async fn startup(&self) -> usize {
        self.capture.start();

        // Feed cursor samples from the capture thread into the tracker.
        let (tx, mut rx) = mpsc::channel(64);
        self.capture.set_cursor_listener(tx);
        let tracker = self.tracker.clone();
        let feed = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                tracker
                    .lock()
                    .unwrap()
                    .sample(sample.x, sample.y, sample.timestamp_ms);
            }
        });
        *self.cursor_feed.lock().unwrap() = Some(feed);

        let zone_count = self.mapper.recapture().await;
        info!(zone_count, "startup analysis complete");
        zone_count
    }

    /// Execute one natural-language task, recording the session when
    /// recording is enabled.
    pub async fn run_task(&self, task: &str) -> TaskResult {
        let screen = self.platform.get_screen_size().unwrap_or((0, 0));
        self.recorder.start_session(task, screen);
        if let Some(frame) = self.capture.latest() {
            self.recorder.record_frame(&frame);
        }

        let result = self.director.execute_task(task).await;

        for step_result in &result.step_results {
            self.recorder.record_step(step_result);
            self.recorder.record_events(&step_result.events);
        }
        if let Some(dir) = self.recorder.stop() {
            info!(dir = %dir.display(), "session recording saved");
        }
        result
    }

    /// Stop all background work. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.capture.stop();
        if let Some(feed) = self.cursor_feed.lock().unwrap().take() {
            feed.abort();
        }
        if self.recorder.is_active() {
            warn!("finalizing recording during shutdown");
            self.recorder.stop();
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> Arc<ZoneRegistry> {
        self.registry.clone()
    }

    pub fn capture(&self) -> Arc<CaptureLoop> {
        self.capture.clone()
    }

    pub fn mapper(&self) -> Arc<CanvasMapper> {
        self.mapper.clone()
    }
}
