mod common;

use ciu_agent::models::{MouseButton, Rect, StepErrorKind, TaskStep};
use ciu_agent::platform::mock::PlatformCall;
use common::*;
use serde_json::json;
use std::collections::BTreeMap;

fn step(zone_id: &str, action_type: &str, parameters: serde_json::Value) -> Vec<serde_json::Value> {
    vec![step_record(1, zone_id, action_type, parameters, "", "test step")]
}

#[tokio::test(start_paused = true)]
async fn global_key_press_goes_straight_to_the_platform() {
    let rig = rig();
    rig.transport
        .push_plan(&step("__global__", "key_press", json!({"key": "ctrl+shift+s"})));
    let result = rig.agent.run_task("save all").await;
    assert!(result.success);
    assert_eq!(
        rig.platform.calls(),
        vec![PlatformCall::KeyPress("ctrl+shift+s".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn global_click_uses_explicit_coordinates() {
    let rig = rig();
    rig.transport.push_plan(&step(
        "__global__",
        "click",
        json!({"x": 640, "y": 360, "button": "right"}),
    ));
    let result = rig.agent.run_task("context menu").await;
    assert!(result.success);
    assert_eq!(
        rig.platform.calls(),
        vec![PlatformCall::Click(640, 360, MouseButton::Right)]
    );
}

#[tokio::test(start_paused = true)]
async fn global_click_without_coordinates_fails() {
    // Clicks may not fall back to "__global__" without a point; the
    // retry path re-executes, then the director replans and gives up
    // with nothing else scripted.
    let rig = rig();
    rig.transport.push_plan(&step("__global__", "click", json!({})));
    let result = rig.agent.run_task("click something").await;
    assert!(!result.success);
    assert!(rig.platform.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn global_drag_is_unsupported() {
    let rig = rig();
    rig.transport.push_plan(&step(
        "__global__",
        "drag",
        json!({"to_x": 10, "to_y": 10}),
    ));
    let result = rig.agent.run_task("drag").await;
    assert!(!result.success);
    assert_eq!(
        result.error_kind,
        Some(StepErrorKind::UnsupportedGlobalAction)
    );
}

#[tokio::test(start_paused = true)]
async fn sentinel_steps_never_touch_motion_or_zones() {
    // Command-mode and replan steps must not consult the motion
    // planner or move the cursor.
    let rig = rig();
    rig.agent
        .registry()
        .register(test_zone("zone_a", Rect::new(0, 0, 2000, 2000)));
    rig.transport.push_plan(&[
        step_record(1, "__global__", "type_text", json!({"text": "abc"}), "", "type"),
        step_record(2, "__replan__", "replan", json!({}), "", "replan"),
    ]);
    // Replan round: recapture + fresh plan.
    rig.transport
        .push_vision_zones(&[zone_record("zone_a", "A", "button", 0, 0, 100, 50)]);
    rig.transport
        .push_plan(&[step_record(1, "__global__", "key_press", json!({"key": "esc"}), "", "dismiss")]);

    let result = rig.agent.run_task("type abc").await;
    assert!(result.success, "error: {}", result.error);
    assert!(
        !rig.platform
            .calls()
            .iter()
            .any(|c| matches!(c, PlatformCall::MoveCursor(_, _))),
        "sentinel steps moved the cursor"
    );
}

#[tokio::test(start_paused = true)]
async fn visual_step_requires_navigation_and_verification() {
    let rig = rig();
    rig.agent
        .registry()
        .register(test_zone("zone_field", Rect::new(300, 200, 200, 30)));
    rig.transport
        .push_plan(&step("zone_field", "type_text", json!({"text": "hi"})));

    let result = rig.agent.run_task("type into the field").await;
    assert!(result.success, "error: {}", result.error);

    let calls = rig.platform.calls();
    let type_index = calls
        .iter()
        .position(|c| matches!(c, PlatformCall::TypeText(t) if t == "hi"))
        .expect("text typed");
    assert!(
        calls[..type_index]
            .iter()
            .any(|c| matches!(c, PlatformCall::MoveCursor(400, 215))),
        "visual step must navigate into the zone first"
    );
}

#[tokio::test(start_paused = true)]
async fn replan_sentinel_is_a_safe_noop_at_the_executor() {
    // The director intercepts sentinels before dispatch; the executor
    // keeps its own guard so a misrouted sentinel cannot fail a task.
    use ciu_agent::models::REPLAN_ZONE;
    let sentinel = TaskStep {
        step_number: 9,
        zone_id: REPLAN_ZONE.to_string(),
        zone_label: String::new(),
        action_type: "replan".to_string(),
        parameters: BTreeMap::new(),
        expected_change: String::new(),
        description: String::new(),
    };
    assert!(sentinel.is_replan());
    // Executed through a plan whose sentinel the director consumes:
    // the task ends in a fresh plan, not a failure.
    let rig = rig();
    rig.transport.push_plan(&[serde_json::to_value(&sentinel).unwrap()]);
    rig.transport
        .push_vision_zones(&[zone_record("zone_a", "A", "button", 0, 0, 100, 50)]);
    rig.transport
        .push_plan(&[step_record(1, "__global__", "key_press", json!({"key": "esc"}), "", "dismiss")]);
    let result = rig.agent.run_task("noop then dismiss").await;
    assert!(result.success, "error: {}", result.error);
}
