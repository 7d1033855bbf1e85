use std::sync::Arc;

use tracing::{info, warn};

use crate::brush::BrushController;
use crate::clock::Clock;
use crate::models::{
    Action, ActionKind, MouseButton, SpatialEvent, StepErrorKind, TaskStep,
};
use crate::platform::PlatformAdapter;

/// Result of executing one task step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: TaskStep,
    pub success: bool,
    pub events: Vec<SpatialEvent>,
    pub error: String,
    pub error_kind: Option<StepErrorKind>,
    pub timestamp_ms: u64,
}

impl StepResult {
    fn ok(step: &TaskStep, events: Vec<SpatialEvent>, t: u64) -> Self {
        Self {
            step: step.clone(),
            success: true,
            events,
            error: String::new(),
            error_kind: None,
            timestamp_ms: t,
        }
    }

    fn fail(step: &TaskStep, error: String, kind: StepErrorKind, t: u64) -> Self {
        Self {
            step: step.clone(),
            success: false,
            events: Vec::new(),
            error,
            error_kind: Some(kind),
            timestamp_ms: t,
        }
    }
}

/// Dispatches a plan step either through the brush controller (visual
/// mode) or straight to the platform adapter (command mode).
pub struct StepExecutor {
    brush: Arc<BrushController>,
    platform: Arc<dyn PlatformAdapter>,
    clock: Clock,
}

impl StepExecutor {
    pub fn new(brush: Arc<BrushController>, platform: Arc<dyn PlatformAdapter>, clock: Clock) -> Self {
        Self {
            brush,
            platform,
            clock,
        }
    }

    pub async fn execute(&self, step: &TaskStep) -> StepResult {
        let t = self.clock.now_ms();

        // The director intercepts replan sentinels before dispatch;
        // this fallback keeps a misrouted sentinel from halting the
        // task.
        if step.is_replan() {
            info!(step = step.step_number, "replan sentinel reached executor, no-op");
            return StepResult::ok(step, Vec::new(), t);
        }

        if step.is_global() {
            return self.execute_global(step, t);
        }
        self.execute_visual(step, t).await
    }

    // Command mode: no navigation, no zone verification.
    fn execute_global(&self, step: &TaskStep, t: u64) -> StepResult {
        let kind = match ActionKind::parse(&step.action_type) {
            Some(kind) => kind,
            None => {
                return StepResult::fail(
                    step,
                    format!("unknown action type: '{}'", step.action_type),
                    StepErrorKind::ParseError,
                    t,
                );
            }
        };

        let outcome = match kind {
            ActionKind::KeyPress => match step.parameters.get("key").and_then(|v| v.as_str()) {
                Some(chord) => self.platform.key_press(chord),
                None => {
                    return StepResult::fail(
                        step,
                        "missing required parameter 'key'".to_string(),
                        StepErrorKind::ActionFailed,
                        t,
                    );
                }
            },
            ActionKind::TypeText => match step.parameters.get("text").and_then(|v| v.as_str()) {
                Some(text) => self.platform.type_text(text),
                None => {
                    return StepResult::fail(
                        step,
                        "missing required parameter 'text'".to_string(),
                        StepErrorKind::ActionFailed,
                        t,
                    );
                }
            },
            ActionKind::Click => {
                let x = step.parameters.get("x").and_then(|v| v.as_i64());
                let y = step.parameters.get("y").and_then(|v| v.as_i64());
                match (x, y) {
                    (Some(x), Some(y)) => {
                        let button = step
                            .parameters
                            .get("button")
                            .and_then(|v| v.as_str())
                            .map(MouseButton::parse)
                            .unwrap_or_default();
                        self.platform.click(x as i32, y as i32, button)
                    }
                    _ => {
                        return StepResult::fail(
                            step,
                            "global click requires explicit x/y".to_string(),
                            StepErrorKind::ActionFailed,
                            t,
                        );
                    }
                }
            }
            other => {
                warn!(step = step.step_number, ?other, "action not allowed in command mode");
                return StepResult::fail(
                    step,
                    format!("action '{}' is not allowed in command mode", step.action_type),
                    StepErrorKind::UnsupportedGlobalAction,
                    t,
                );
            }
        };

        match outcome {
            Ok(()) => StepResult::ok(step, Vec::new(), t),
            Err(err) => StepResult::fail(step, err.to_string(), StepErrorKind::PlatformError, t),
        }
    }

    // Visual mode: navigate into the zone, verify arrival, act.
    async fn execute_visual(&self, step: &TaskStep, t: u64) -> StepResult {
        let kind = match ActionKind::parse(&step.action_type) {
            Some(kind) => kind,
            None => {
                return StepResult::fail(
                    step,
                    format!("unknown action type: '{}'", step.action_type),
                    StepErrorKind::ParseError,
                    t,
                );
            }
        };

        let mut action = Action::new(kind, Some(step.zone_id.clone()));
        action.parameters = step.parameters.clone();

        let result = self.brush.execute_action(action).await;
        if result.success {
            return StepResult::ok(step, result.events, self.clock.now_ms());
        }
        StepResult {
            step: step.clone(),
            success: false,
            events: result.events,
            error: result.error,
            error_kind: result.error_kind.or(Some(StepErrorKind::ActionFailed)),
            timestamp_ms: self.clock.now_ms(),
        }
    }
}
