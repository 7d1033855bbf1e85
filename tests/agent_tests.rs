mod common;

use common::*;
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn startup_populates_the_registry_before_tasks() {
    let rig = rig();
    rig.transport.push_vision_zones(&[
        zone_record("zone_a", "A", "button", 0, 0, 100, 50),
        zone_record("zone_b", "B", "link", 200, 0, 100, 50),
    ]);

    let zones = rig.agent.startup().await;
    assert_eq!(zones, 2);
    assert_eq!(rig.agent.registry().count(), 2);
    assert!(rig.agent.capture().is_running());
    assert!(rig.agent.capture().latest().is_some());

    rig.agent.shutdown();
    assert!(!rig.agent.capture().is_running());
}

#[tokio::test(start_paused = true)]
async fn startup_with_failed_vision_leaves_registry_empty_but_usable() {
    let rig = rig();
    // Nothing scripted: the vision call fails, the registry stays
    // empty, and a keyboard-only task can still run.
    let zones = rig.agent.startup().await;
    assert_eq!(zones, 0);

    rig.transport.push_plan(&[step_record(
        1,
        "__global__",
        "key_press",
        json!({"key": "esc"}),
        "",
        "Dismiss",
    )]);
    let result = rig.agent.run_task("dismiss whatever is open").await;
    assert!(result.success);
    rig.agent.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let rig = rig();
    rig.transport
        .push_vision_zones(&[zone_record("zone_a", "A", "button", 0, 0, 100, 50)]);
    rig.agent.startup().await;
    rig.agent.shutdown();
    rig.agent.shutdown();
    assert!(!rig.agent.capture().is_running());
}

#[tokio::test(start_paused = true)]
async fn recording_session_is_written_around_a_task() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = ciu_agent::config::Settings {
        recording_enabled: true,
        session_dir: tmp.path().to_string_lossy().to_string(),
        ..test_settings()
    };
    let rig = rig_with_settings(settings);
    rig.transport
        .push_vision_zones(&[zone_record("zone_a", "A", "button", 0, 0, 100, 50)]);
    rig.agent.startup().await;

    rig.transport.push_plan(&[step_record(
        1,
        "__global__",
        "key_press",
        json!({"key": "esc"}),
        "",
        "Dismiss",
    )]);
    let result = rig.agent.run_task("dismiss").await;
    assert!(result.success);
    rig.agent.shutdown();

    // Exactly one session directory with a manifest naming the task.
    let sessions: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().flatten().collect();
    assert_eq!(sessions.len(), 1);
    let manifest_path = sessions[0].path().join("manifest.json");
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["task_description"], "dismiss");
    assert!(manifest["frame_count"].as_u64().unwrap() >= 1);
}

#[tokio::test(start_paused = true)]
async fn ring_capacity_follows_settings() {
    let settings = ciu_agent::config::Settings {
        target_fps: 1,
        buffer_seconds: 5.0,
        ..test_settings()
    };
    let rig = rig_with_settings(settings);
    let ring = rig.agent.capture().ring();
    assert_eq!(ring.capacity(), 5);

    // Overfill on demand; the ring holds only the newest five.
    for _ in 0..12 {
        rig.agent.capture().capture_once().unwrap();
    }
    assert_eq!(ring.len(), 5);
    assert_eq!(ring.latest().unwrap().frame_number, 11);
}
