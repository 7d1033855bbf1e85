use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable configuration for the whole agent.
///
/// Constructed once at build time and shared by read-only reference.
/// Unknown keys in an overlay are silently ignored so forward-compatible
/// config files do not break older agent versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Capture loop
    pub target_fps: u32,
    pub max_fps: u32,
    pub buffer_seconds: f32,

    // Frame differencing (tier 0)
    pub diff_threshold_percent: f32,
    pub tier2_threshold_percent: f32,
    pub cursor_diff_area_ceiling: u32,
    pub stability_wait_ms: u64,

    // Zone detection
    pub min_zone_confidence: f32,
    pub zone_expiry_seconds: f32,
    pub max_zones_per_region: usize,

    // Brush
    pub hover_threshold_ms: u64,
    pub motion_speed_pixels_per_sec: f32,
    pub step_delay_seconds: f32,

    // Remote API
    pub api_timeout_vision_seconds: f32,
    pub api_timeout_text_seconds: f32,
    pub api_max_retries: u32,
    pub api_backoff_base_seconds: f32,

    // Task budget
    pub max_api_calls: u32,
    pub max_replans: u32,
    pub max_step_retries: u32,

    // Recapture heuristic: case-insensitive substrings matched against a
    // completed step's expected_change.
    pub recapture_keywords: Vec<String>,

    // Session recording
    pub recording_enabled: bool,
    pub session_dir: String,
    pub save_frames: bool,

    // Platform override; empty means auto-detect.
    pub platform_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_fps: 15,
            max_fps: 30,
            buffer_seconds: 5.0,

            diff_threshold_percent: 0.5,
            tier2_threshold_percent: 30.0,
            cursor_diff_area_ceiling: 2_500,
            stability_wait_ms: 250,

            min_zone_confidence: 0.4,
            zone_expiry_seconds: 60.0,
            max_zones_per_region: 16,

            hover_threshold_ms: 500,
            motion_speed_pixels_per_sec: 1_500.0,
            step_delay_seconds: 2.0,

            api_timeout_vision_seconds: 60.0,
            api_timeout_text_seconds: 30.0,
            api_max_retries: 3,
            api_backoff_base_seconds: 2.0,

            max_api_calls: 30,
            max_replans: 5,
            max_step_retries: 3,

            recapture_keywords: [
                "window",
                "dialog",
                "open",
                "launch",
                "appear",
                "application",
                "menu",
                "save as",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),

            recording_enabled: false,
            session_dir: "sessions".to_string(),
            save_frames: false,

            platform_name: String::new(),
        }
    }
}

impl Settings {
    /// Build settings from a JSON overlay. Missing keys fall back to
    /// defaults; unrecognized keys are discarded.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Ring-buffer capacity in frames.
    pub fn ring_capacity(&self) -> usize {
        ((self.buffer_seconds * self.target_fps as f32) as usize).max(1)
    }

    /// True when any of the recapture keywords occurs in `expected_change`.
    pub fn matches_recapture_keyword(&self, expected_change: &str) -> bool {
        let lowered = expected_change.to_lowercase();
        self.recapture_keywords
            .iter()
            .any(|kw| lowered.contains(&kw.to_lowercase()))
    }
}
