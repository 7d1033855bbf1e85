use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel zone id for command-mode steps (keyboard or explicit
/// coordinates; no navigation, no zone verification).
pub const GLOBAL_ZONE: &str = "__global__";

/// Sentinel zone id instructing the director to recapture the screen
/// and request a fresh plan for the remaining work.
pub const REPLAN_ZONE: &str = "__replan__";

/// A single step in a task plan, as returned by the remote planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    #[serde(default)]
    pub step_number: u32,
    pub zone_id: String,
    #[serde(default)]
    pub zone_label: String,
    pub action_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub expected_change: String,
    #[serde(default)]
    pub description: String,
}

impl TaskStep {
    pub fn is_global(&self) -> bool {
        self.zone_id == GLOBAL_ZONE
    }

    pub fn is_replan(&self) -> bool {
        self.zone_id == REPLAN_ZONE
    }

    /// A visual step navigates the cursor to a real zone before acting.
    pub fn is_visual(&self) -> bool {
        !self.is_global() && !self.is_replan()
    }
}

/// A decomposed task plan with ordered steps.
#[derive(Debug, Clone, Default)]
pub struct TaskPlan {
    pub task_description: String,
    pub steps: Vec<TaskStep>,
    pub raw_response: String,
    pub success: bool,
    pub error: String,
    pub api_calls_used: u32,
    pub latency_ms: u64,
}

impl TaskPlan {
    pub fn failed(task: &str, error: String, api_calls_used: u32) -> Self {
        Self {
            task_description: task.to_string(),
            success: false,
            error,
            api_calls_used,
            ..Default::default()
        }
    }
}
