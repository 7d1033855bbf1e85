#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use ciu_agent::config::Settings;
use ciu_agent::llm::{LlmError, LlmTransport};
use ciu_agent::models::{Rect, Zone, ZoneKind, ZoneState};
use ciu_agent::platform::mock::MockPlatform;
use ciu_agent::{build_agent, Agent};

/// Transport with two scripted queues: vision requests (payloads whose
/// first content block is an image) and planner requests (text-only).
pub struct ScriptedTransport {
    vision: Mutex<VecDeque<Result<String, LlmError>>>,
    planner: Mutex<VecDeque<Result<String, LlmError>>>,
    pub vision_calls: Mutex<u32>,
    pub planner_calls: Mutex<u32>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            vision: Mutex::new(VecDeque::new()),
            planner: Mutex::new(VecDeque::new()),
            vision_calls: Mutex::new(0),
            planner_calls: Mutex::new(0),
        })
    }

    pub fn push_vision(&self, response: Result<String, LlmError>) {
        self.vision.lock().unwrap().push_back(response);
    }

    pub fn push_planner(&self, response: Result<String, LlmError>) {
        self.planner.lock().unwrap().push_back(response);
    }

    /// Queue a vision reply carrying the given zone records.
    pub fn push_vision_zones(&self, zones: &[Value]) {
        self.push_vision(Ok(message_body(&Value::Array(zones.to_vec()).to_string())));
    }

    /// Queue a planner reply carrying the given step records.
    pub fn push_plan(&self, steps: &[Value]) {
        self.push_planner(Ok(message_body(&Value::Array(steps.to_vec()).to_string())));
    }
}

#[async_trait]
impl LlmTransport for ScriptedTransport {
    async fn send(&self, payload: Value, _timeout: Duration) -> Result<String, LlmError> {
        let is_vision = payload["messages"][0]["content"][0]["type"] == "image";
        let queue = if is_vision {
            *self.vision_calls.lock().unwrap() += 1;
            &self.vision
        } else {
            *self.planner_calls.lock().unwrap() += 1;
            &self.planner
        };
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("transport script exhausted".to_string())))
    }
}

/// Wrap model output text in a Messages API response body.
pub fn message_body(text: &str) -> String {
    json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 200, "output_tokens": 100}
    })
    .to_string()
}

/// A zone record in the vision wire format.
pub fn zone_record(id: &str, label: &str, kind: &str, x: i32, y: i32, w: u32, h: u32) -> Value {
    json!({
        "id": id,
        "label": label,
        "kind": kind,
        "state": "enabled",
        "bounds": {"x": x, "y": y, "w": w, "h": h},
        "confidence": 0.9,
    })
}

/// A plan step record in the planner wire format.
pub fn step_record(
    number: u32,
    zone_id: &str,
    action_type: &str,
    parameters: Value,
    expected_change: &str,
    description: &str,
) -> Value {
    json!({
        "step_number": number,
        "zone_id": zone_id,
        "zone_label": zone_id,
        "action_type": action_type,
        "parameters": parameters,
        "expected_change": expected_change,
        "description": description,
    })
}

pub fn test_zone(id: &str, bounds: Rect) -> Zone {
    Zone {
        id: id.to_string(),
        label: id.to_string(),
        kind: ZoneKind::Button,
        state: ZoneState::Enabled,
        bounds,
        confidence: 1.0,
        parent_id: None,
        last_seen: 0,
    }
}

/// Settings tuned for tests: no inter-step delay, no retry backoff.
pub fn test_settings() -> Settings {
    Settings {
        step_delay_seconds: 0.0,
        api_backoff_base_seconds: 0.0,
        api_max_retries: 1,
        ..Settings::default()
    }
}

pub struct TestRig {
    pub platform: Arc<MockPlatform>,
    pub transport: Arc<ScriptedTransport>,
    pub agent: Agent,
}

/// A wired agent over a mock platform and scripted transport.
pub fn rig_with_settings(settings: Settings) -> TestRig {
    let platform = Arc::new(MockPlatform::new(1920, 1080));
    let transport = ScriptedTransport::new();
    let agent = build_agent(platform.clone(), transport.clone(), settings);
    TestRig {
        platform,
        transport,
        agent,
    }
}

pub fn rig() -> TestRig {
    rig_with_settings(test_settings())
}
