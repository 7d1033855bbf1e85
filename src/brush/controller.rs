use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::models::{Action, SpatialEvent, SpatialEventKind, StepErrorKind};
use crate::platform::PlatformAdapter;
use crate::registry::ZoneRegistry;

use super::action_executor::{ActionExecutor, ActionResult};
use super::motion::{MotionPlanner, Trajectory, TrajectoryKind};
use super::tracker::ZoneTracker;

/// Outcome of moving the cursor to a target zone.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub success: bool,
    pub target_zone_id: String,
    pub trajectory: Trajectory,
    pub events: Vec<SpatialEvent>,
    pub error: String,
    pub error_kind: Option<StepErrorKind>,
    pub duration_ms: u64,
}

/// Combined result of navigation plus the action itself.
#[derive(Debug, Clone)]
pub struct BrushActionResult {
    pub navigation: NavigationResult,
    pub action: Option<ActionResult>,
    pub events: Vec<SpatialEvent>,
    pub success: bool,
    pub error: String,
    pub error_kind: Option<StepErrorKind>,
}

/// Composes motion, arrival verification, and action execution for one
/// zone-targeted step.
pub struct BrushController {
    platform: Arc<dyn PlatformAdapter>,
    registry: Arc<ZoneRegistry>,
    tracker: Arc<Mutex<ZoneTracker>>,
    planner: MotionPlanner,
    executor: ActionExecutor,
    clock: Clock,
}

impl BrushController {
    pub fn new(
        platform: Arc<dyn PlatformAdapter>,
        registry: Arc<ZoneRegistry>,
        tracker: Arc<Mutex<ZoneTracker>>,
        planner: MotionPlanner,
        executor: ActionExecutor,
        clock: Clock,
    ) -> Self {
        Self {
            platform,
            registry,
            tracker,
            planner,
            executor,
            clock,
        }
    }

    /// Drive the cursor into the target zone along a planned
    /// trajectory. Arrival is verified against the zone tracker, not
    /// just raw coordinates, so a zone swapped out mid-flight fails
    /// with `brush_lost`.
    pub async fn navigate_to_zone(
        &self,
        target_zone_id: &str,
        kind: TrajectoryKind,
        avoid_zone_ids: &[String],
    ) -> NavigationResult {
        let started = self.clock.now_ms();
        let empty = Trajectory {
            kind,
            points: Vec::new(),
        };

        let zone = match self.registry.get(target_zone_id) {
            Some(zone) => zone,
            None => {
                return NavigationResult {
                    success: false,
                    target_zone_id: target_zone_id.to_string(),
                    trajectory: empty,
                    events: Vec::new(),
                    error: format!("zone '{target_zone_id}' not found in registry"),
                    error_kind: Some(StepErrorKind::ZoneNotFound),
                    duration_ms: 0,
                };
            }
        };

        let cursor = match self.platform.get_cursor_pos() {
            Ok(pos) => pos,
            Err(err) => {
                return NavigationResult {
                    success: false,
                    target_zone_id: target_zone_id.to_string(),
                    trajectory: empty,
                    events: Vec::new(),
                    error: err.to_string(),
                    error_kind: Some(StepErrorKind::PlatformError),
                    duration_ms: 0,
                };
            }
        };

        let trajectory = match kind {
            TrajectoryKind::Direct => self.planner.plan_direct(cursor, zone.aim_point()),
            TrajectoryKind::Safe => {
                let avoid: Vec<_> = avoid_zone_ids
                    .iter()
                    .filter_map(|id| self.registry.get(id))
                    .map(|z| z.bounds)
                    .collect();
                self.planner.plan_safe(cursor, zone.aim_point(), &avoid)
            }
            TrajectoryKind::Exploratory => self.planner.plan_exploratory(cursor, zone.bounds),
        };

        let mut events: Vec<SpatialEvent> = Vec::new();
        let pacing = Duration::from_millis(self.planner.pacing_interval_ms());
        for (index, point) in trajectory.points.iter().enumerate() {
            if let Err(err) = self.platform.move_cursor(point.0, point.1) {
                return NavigationResult {
                    success: false,
                    target_zone_id: target_zone_id.to_string(),
                    trajectory,
                    events,
                    error: format!("move_cursor failed: {err}"),
                    error_kind: Some(StepErrorKind::PlatformError),
                    duration_ms: self.clock.now_ms() - started,
                };
            }
            let t = self.clock.now_ms();
            events.extend(self.tracker.lock().unwrap().sample(point.0, point.1, t));
            if index + 1 < trajectory.points.len() {
                tokio::time::sleep(pacing).await;
            }
        }

        // Arrival check: the tracker, fed the same waypoints, must have
        // the target as its current zone.
        let arrived = self.tracker.lock().unwrap().is_in_zone(target_zone_id);
        let duration_ms = self.clock.now_ms() - started;

        if !arrived {
            let pos = self.platform.get_cursor_pos().unwrap_or((0, 0));
            warn!(target = target_zone_id, cursor = ?pos, "brush lost after navigation");
            events.push(SpatialEvent::new(
                SpatialEventKind::BrushLost,
                "",
                pos,
                self.clock.now_ms(),
            ));
            return NavigationResult {
                success: false,
                target_zone_id: target_zone_id.to_string(),
                trajectory,
                events,
                error: "cursor did not arrive in target zone".to_string(),
                error_kind: Some(StepErrorKind::BrushLost),
                duration_ms,
            };
        }

        debug!(
            target = target_zone_id,
            waypoints = trajectory.points.len(),
            duration_ms,
            "navigation complete"
        );
        NavigationResult {
            success: true,
            target_zone_id: target_zone_id.to_string(),
            trajectory,
            events,
            error: String::new(),
            error_kind: None,
            duration_ms,
        }
    }

    /// Navigate to the action's target zone, then execute the action.
    pub async fn execute_action(&self, action: Action) -> BrushActionResult {
        let target = action.target_zone_id.clone().unwrap_or_default();
        let navigation = self
            .navigate_to_zone(&target, TrajectoryKind::Direct, &[])
            .await;

        if !navigation.success {
            let events = navigation.events.clone();
            let error = navigation.error.clone();
            let error_kind = navigation.error_kind;
            return BrushActionResult {
                navigation,
                action: None,
                events,
                success: false,
                error,
                error_kind,
            };
        }

        let result = self.executor.execute(action, self.clock.now_ms());
        let mut events = navigation.events.clone();
        events.extend(result.events.clone());
        BrushActionResult {
            success: result.success,
            error: result.error.clone(),
            error_kind: result.error_kind,
            navigation,
            action: Some(result),
            events,
        }
    }

    pub fn current_zone(&self) -> Option<String> {
        self.tracker.lock().unwrap().current_zone()
    }

    pub fn cursor_pos(&self) -> anyhow::Result<(i32, i32)> {
        self.platform.get_cursor_pos()
    }
}
