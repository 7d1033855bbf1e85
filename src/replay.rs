use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::capture::Frame;
use crate::config::Settings;
use crate::director::StepResult;
use crate::models::SpatialEvent;

struct ActiveSession {
    id: String,
    dir: PathBuf,
    task_description: String,
    screen: (u32, u32),
    started_unix_ms: u64,
    frames: Vec<Value>,
    events: Vec<Value>,
    steps: Vec<Value>,
}

/// Records one task session to disk: frame metadata, spatial events,
/// and step results as JSON lines plus a manifest.
///
/// Inactive when `recording_enabled` is off; `stop` is idempotent.
pub struct SessionRecorder {
    settings: Arc<Settings>,
    session: Mutex<Option<ActiveSession>>,
}

impl SessionRecorder {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    /// Begin a session; returns its id, or `None` when recording is
    /// disabled or a session is already active.
    pub fn start_session(&self, task_description: &str, screen: (u32, u32)) -> Option<String> {
        if !self.settings.recording_enabled {
            return None;
        }
        let mut guard = self.session.lock().unwrap();
        if guard.is_some() {
            warn!("recording session already active");
            return None;
        }

        let id = format!("session_{}", Uuid::new_v4().simple());
        let dir = PathBuf::from(&self.settings.session_dir).join(&id);
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(%err, "could not create session directory");
            return None;
        }
        if self.settings.save_frames {
            let _ = fs::create_dir_all(dir.join("frames"));
        }

        info!(session = %id, "recording session started");
        *guard = Some(ActiveSession {
            id: id.clone(),
            dir,
            task_description: task_description.to_string(),
            screen,
            started_unix_ms: unix_ms(),
            frames: Vec::new(),
            events: Vec::new(),
            steps: Vec::new(),
        });
        Some(id)
    }

    pub fn record_frame(&self, frame: &Frame) {
        let mut guard = self.session.lock().unwrap();
        let session = match guard.as_mut() {
            Some(session) => session,
            None => return,
        };
        session.frames.push(json!({
            "frame_number": frame.frame_number,
            "timestamp_ms": frame.timestamp_ms,
            "cursor": [frame.cursor.0, frame.cursor.1],
            "width": frame.width(),
            "height": frame.height(),
        }));
        if self.settings.save_frames {
            let path = session
                .dir
                .join("frames")
                .join(format!("frame_{:06}.png", frame.frame_number));
            let dynamic = image::DynamicImage::ImageRgba8(frame.image.clone());
            if let Err(err) = dynamic.save(&path) {
                warn!(%err, "could not save frame image");
            }
        }
    }

    pub fn record_events(&self, events: &[SpatialEvent]) {
        let mut guard = self.session.lock().unwrap();
        if let Some(session) = guard.as_mut() {
            for event in events {
                if let Ok(value) = serde_json::to_value(event) {
                    session.events.push(value);
                }
            }
        }
    }

    pub fn record_step(&self, result: &StepResult) {
        let mut guard = self.session.lock().unwrap();
        if let Some(session) = guard.as_mut() {
            session.steps.push(json!({
                "step": result.step,
                "success": result.success,
                "error": result.error,
                "error_kind": result.error_kind,
                "timestamp_ms": result.timestamp_ms,
            }));
        }
    }

    /// Flush everything to disk and close the session. Safe to call
    /// any number of times; only the first call writes.
    pub fn stop(&self) -> Option<PathBuf> {
        let session = self.session.lock().unwrap().take()?;

        write_jsonl(&session.dir.join("frames.jsonl"), &session.frames);
        write_jsonl(&session.dir.join("events.jsonl"), &session.events);
        write_jsonl(&session.dir.join("steps.jsonl"), &session.steps);

        let manifest = json!({
            "session_id": session.id,
            "task_description": session.task_description,
            "screen": [session.screen.0, session.screen.1],
            "started_unix_ms": session.started_unix_ms,
            "ended_unix_ms": unix_ms(),
            "frame_count": session.frames.len(),
            "event_count": session.events.len(),
            "step_count": session.steps.len(),
        });
        match serde_json::to_string_pretty(&manifest) {
            Ok(text) => {
                if let Err(err) = fs::write(session.dir.join("manifest.json"), text) {
                    warn!(%err, "could not write session manifest");
                }
            }
            Err(err) => warn!(%err, "could not serialize session manifest"),
        }

        info!(session = %session.id, dir = %session.dir.display(), "recording session saved");
        Some(session.dir)
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }
}

fn write_jsonl(path: &PathBuf, values: &[Value]) {
    let lines: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    if let Err(err) = fs::write(path, lines.join("\n")) {
        warn!(%err, path = %path.display(), "could not write session file");
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpatialEventKind;

    fn recorder(dir: &std::path::Path) -> SessionRecorder {
        let settings = Settings {
            recording_enabled: true,
            session_dir: dir.to_string_lossy().to_string(),
            ..Settings::default()
        };
        SessionRecorder::new(Arc::new(settings))
    }

    #[test]
    fn disabled_recording_is_inert() {
        let recorder = SessionRecorder::new(Arc::new(Settings::default()));
        assert!(recorder.start_session("task", (800, 600)).is_none());
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn session_round_trip_writes_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = recorder(tmp.path());

        let id = recorder.start_session("open notepad", (800, 600)).unwrap();
        assert!(id.starts_with("session_"));
        recorder.record_events(&[SpatialEvent::new(
            SpatialEventKind::Enter,
            "zone_a",
            (10, 10),
            5,
        )]);

        let dir = recorder.stop().unwrap();
        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["task_description"], "open notepad");
        assert_eq!(manifest["event_count"], 1);
        let events = fs::read_to_string(dir.join("events.jsonl")).unwrap();
        assert!(events.contains("zone_a"));

        // Second stop is a no-op.
        assert!(recorder.stop().is_none());
    }
}
