use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Settings;
use crate::llm::{extract_json_payload, extract_text_content, LlmTransport, MODEL};
use crate::models::{TaskPlan, TaskStep, Zone};

const MAX_TOKENS: u32 = 2_048;

const SYSTEM_PROMPT: &str = "You are a GUI task execution planner for a desktop automation \
agent. The agent controls the mouse cursor and keyboard on a real desktop.\n\
\n\
The agent has TWO execution modes:\n\
1. VISUAL MODE — use a zone_id from the zone list. The agent physically moves the cursor \
into that zone before acting.\n\
2. COMMAND MODE — use zone_id \"__global__\" for keyboard shortcuts with no on-screen \
target.\n\
\n\
MANDATORY RULES:\n\
1. If a listed zone matches the element you want, you MUST use that zone's id.\n\
2. Every click MUST carry a real zone id, never \"__global__\".\n\
3. Typing into a visible field is two steps: click the field's zone, then \"__global__\" \
type_text.\n\
4. \"__global__\" is only for shortcuts with no visible target, or typing into an \
already-focused field.\n\
5. After any step whose expected_change implies a major UI transition (app launch, dialog \
opening), append a step with zone_id \"__replan__\" and action_type \"replan\" so the agent \
re-captures the screen and plans the rest with fresh zones.\n\
\n\
Return ONLY a JSON array. Each element:\n\
{\"step_number\": int, \"zone_id\": \"zone_x\" | \"__global__\" | \"__replan__\", \
\"zone_label\": string, \"action_type\": \"click\"|\"double_click\"|\"type_text\"|\
\"key_press\"|\"scroll\"|\"move\"|\"drag\"|\"replan\", \"parameters\": object, \
\"expected_change\": string, \"description\": string}\n\
\n\
Keep plans short: only plan up to the next major screen change, then add \"__replan__\". \
You will be called again with fresh zones after each transition.";

/// Client for the remote text-LLM task planner.
///
/// Builds the prompt from the task, zone inventory, and completed-step
/// context, and parses the reply into ordered steps. One invocation
/// consumes one API call slot on the director's budget regardless of
/// outcome.
pub struct TaskPlanner {
    transport: Arc<dyn LlmTransport>,
    settings: Arc<Settings>,
    platform_name: String,
}

impl TaskPlanner {
    pub fn new(
        transport: Arc<dyn LlmTransport>,
        settings: Arc<Settings>,
        platform_name: String,
    ) -> Self {
        Self {
            transport,
            settings,
            platform_name,
        }
    }

    /// Produce an ordered plan for `task` given the current zones and
    /// the descriptions of steps already completed.
    pub async fn plan(&self, task: &str, zones: &[Zone], completed_steps: &[String]) -> TaskPlan {
        let payload = self.build_payload(task, zones, completed_steps);
        let timeout = Duration::from_secs_f32(self.settings.api_timeout_text_seconds);
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 0..self.settings.api_max_retries {
            match self.transport.send(payload.clone(), timeout).await {
                Ok(body) => {
                    let raw = extract_text_content(&body).unwrap_or_default();
                    let steps = parse_steps(&raw);
                    let latency_ms = started.elapsed().as_millis() as u64;
                    if steps.is_empty() {
                        // Empty and non-parseable plans are both planner
                        // failures, distinct from transport failures only
                        // in their message.
                        warn!("planner returned no usable steps");
                        return TaskPlan {
                            task_description: task.to_string(),
                            raw_response: raw,
                            success: false,
                            error: "planner returned no usable steps".to_string(),
                            api_calls_used: 1,
                            latency_ms,
                            ..Default::default()
                        };
                    }
                    info!(
                        steps = steps.len(),
                        visual = steps.iter().filter(|s| s.is_visual()).count(),
                        latency_ms,
                        "plan created"
                    );
                    return TaskPlan {
                        task_description: task.to_string(),
                        steps,
                        raw_response: raw,
                        success: true,
                        error: String::new(),
                        api_calls_used: 1,
                        latency_ms,
                    };
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(attempt, %err, "planner call failed");
                    if !err.is_transient() {
                        break;
                    }
                }
            }
            if attempt + 1 < self.settings.api_max_retries {
                let delay = self.settings.api_backoff_base_seconds * 2f32.powi(attempt as i32);
                tokio::time::sleep(Duration::from_secs_f32(delay)).await;
            }
        }

        let mut plan = TaskPlan::failed(task, last_error, 1);
        plan.latency_ms = started.elapsed().as_millis() as u64;
        plan
    }

    fn build_payload(&self, task: &str, zones: &[Zone], completed_steps: &[String]) -> Value {
        let mut user_text = format!("Task: {task}\n\n");
        if !self.platform_name.is_empty() {
            user_text.push_str(&format!("Operating system: {}\n", self.platform_name));
        }
        user_text.push_str(&format!("Zones detected: {}\n", zones.len()));

        if !completed_steps.is_empty() {
            user_text.push_str(
                "\n=== ALREADY COMPLETED (DO NOT REPEAT) ===\n\
                 These steps have already executed successfully:\n",
            );
            for (i, desc) in completed_steps.iter().enumerate() {
                user_text.push_str(&format!("  DONE {}. {desc}\n", i + 1));
            }
            user_text.push_str(
                "Plan ONLY the remaining steps. Do not reopen what is already open.\n",
            );
        }

        user_text.push_str("\nAVAILABLE ZONES (use these ids for visual mode):\n");
        user_text.push_str(&summarize_zones(zones));
        user_text.push_str("\n\nPlan the next steps to accomplish the task.");

        json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": user_text }],
            }],
        })
    }
}

/// One line per zone: id, label, kind, state, center.
pub fn summarize_zones(zones: &[Zone]) -> String {
    if zones.is_empty() {
        return "(no zones available)".to_string();
    }
    zones
        .iter()
        .map(|z| {
            let (cx, cy) = z.bounds.center();
            format!(
                "- id={}  label=\"{}\"  kind={:?}  state={:?}  center=({cx}, {cy})",
                z.id, z.label, z.kind, z.state
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the planner reply into steps. Accepts a bare array, an object
/// wrapping a `steps` array, or a fenced code block; malformed items
/// are skipped.
pub fn parse_steps(raw: &str) -> Vec<TaskStep> {
    let payload = match extract_json_payload(raw) {
        Some(payload) => payload,
        None => return Vec::new(),
    };
    let value: Value = match serde_json::from_str(&payload) {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("steps") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut steps = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<TaskStep>(item) {
            Ok(mut step) => {
                if step.step_number == 0 {
                    step.step_number = index as u32 + 1;
                }
                steps.push(step);
            }
            Err(err) => warn!(index, %err, "skipping malformed plan step"),
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let raw = r#"[
            {"step_number": 1, "zone_id": "__global__", "zone_label": "keyboard",
             "action_type": "key_press", "parameters": {"key": "win"},
             "expected_change": "Start menu opens", "description": "Open the Start menu"},
            {"zone_id": "__replan__", "zone_label": "replan", "action_type": "replan"}
        ]"#;
        let steps = parse_steps(raw);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].is_global());
        assert!(steps[1].is_replan());
        assert_eq!(steps[1].step_number, 2);
    }

    #[test]
    fn parses_wrapped_and_fenced() {
        let steps = parse_steps(
            "```json\n{\"steps\": [{\"zone_id\": \"z1\", \"action_type\": \"click\"}]}\n```",
        );
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_visual());
    }

    #[test]
    fn malformed_items_are_skipped() {
        let steps = parse_steps(r#"[{"zone_id": "z1", "action_type": "click"}, 42]"#);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn garbage_yields_no_steps() {
        assert!(parse_steps("I could not produce a plan.").is_empty());
    }

    #[test]
    fn zone_summary_lists_centers() {
        use crate::models::{Rect, ZoneKind, ZoneState};
        let zones = vec![Zone {
            id: "zone_ok".to_string(),
            label: "OK".to_string(),
            kind: ZoneKind::Button,
            state: ZoneState::Enabled,
            bounds: Rect::new(0, 0, 100, 50),
            confidence: 1.0,
            parent_id: None,
            last_seen: 0,
        }];
        let summary = summarize_zones(&zones);
        assert!(summary.contains("id=zone_ok"));
        assert!(summary.contains("center=(50, 25)"));
        assert_eq!(summarize_zones(&[]), "(no zones available)");
    }
}
