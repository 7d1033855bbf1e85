use std::sync::Arc;

use tracing::{error, warn};

use crate::models::{
    Action, ActionKind, ActionStatus, SpatialEvent, SpatialEventKind, StepErrorKind, Zone,
};
use crate::platform::PlatformAdapter;
use crate::registry::ZoneRegistry;

/// Outcome of executing one atomic action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action: Action,
    pub success: bool,
    pub events: Vec<SpatialEvent>,
    pub error: String,
    pub error_kind: Option<StepErrorKind>,
    pub timestamp_ms: u64,
}

/// Performs a single input action, verifying the cursor sits inside
/// the target zone for zone-bearing kinds.
///
/// Platform failures never escape as raw errors; they are folded into
/// a failed `ActionResult`.
pub struct ActionExecutor {
    platform: Arc<dyn PlatformAdapter>,
    registry: Arc<ZoneRegistry>,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn PlatformAdapter>, registry: Arc<ZoneRegistry>) -> Self {
        Self { platform, registry }
    }

    pub fn execute(&self, action: Action, timestamp_ms: u64) -> ActionResult {
        if !action.kind.is_zone_bearing() {
            return self.key_press(action, timestamp_ms);
        }

        // Zone-bearing kinds re-read the target and require the cursor
        // to already be inside its bounds.
        let zone_id = match action.target_zone_id.as_deref() {
            Some(id) => id.to_string(),
            None => {
                return self.fail(
                    action,
                    "action requires a target zone".to_string(),
                    StepErrorKind::ActionFailed,
                    timestamp_ms,
                );
            }
        };
        let zone = match self.registry.get(&zone_id) {
            Some(zone) => zone,
            None => {
                return self.fail(
                    action,
                    format!("zone '{zone_id}' not found in registry"),
                    StepErrorKind::ZoneNotFound,
                    timestamp_ms,
                );
            }
        };
        match self.platform.get_cursor_pos() {
            Ok((cx, cy)) if zone.contains_point(cx, cy) => {}
            Ok((cx, cy)) => {
                warn!(
                    zone = %zone.id,
                    cursor = ?(cx, cy),
                    "cursor outside target zone at action time"
                );
                return self.fail(
                    action,
                    format!("cursor ({cx}, {cy}) is outside zone '{}'", zone.id),
                    StepErrorKind::BrushLost,
                    timestamp_ms,
                );
            }
            Err(err) => {
                return self.fail(
                    action,
                    err.to_string(),
                    StepErrorKind::PlatformError,
                    timestamp_ms,
                );
            }
        }

        match action.kind {
            ActionKind::Click => self.click(action, zone, timestamp_ms),
            ActionKind::DoubleClick => self.double_click(action, zone, timestamp_ms),
            ActionKind::TypeText => self.type_text(action, zone, timestamp_ms),
            ActionKind::Scroll => self.scroll(action, zone, timestamp_ms),
            ActionKind::Move => self.move_cursor(action, zone, timestamp_ms),
            ActionKind::Drag => self.drag(action, zone, timestamp_ms),
            ActionKind::KeyPress => self.key_press(action, timestamp_ms),
        }
    }

    fn click(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let (x, y) = click_point(&action, &zone);
        let button = action.button();
        if let Err(err) = self.platform.click(x, y, button) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        let event = SpatialEvent::new(SpatialEventKind::Click, &zone.id, (x, y), t);
        self.succeed(action, vec![event], t)
    }

    fn double_click(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let (x, y) = click_point(&action, &zone);
        if let Err(err) = self.platform.double_click(x, y) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        let event = SpatialEvent::new(SpatialEventKind::Click, &zone.id, (x, y), t);
        self.succeed(action, vec![event], t)
    }

    fn type_text(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let text = match action.param_str("text") {
            Some(text) => text.to_string(),
            None => {
                return self.fail(
                    action,
                    "missing required parameter 'text'".to_string(),
                    StepErrorKind::ActionFailed,
                    t,
                );
            }
        };
        if let Err(err) = self.platform.type_text(&text) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        let event = SpatialEvent::new(SpatialEventKind::Type, &zone.id, zone.aim_point(), t);
        self.succeed(action, vec![event], t)
    }

    fn key_press(&self, action: Action, t: u64) -> ActionResult {
        let chord = match action.param_str("key") {
            Some(chord) => chord.to_string(),
            None => {
                return self.fail(
                    action,
                    "missing required parameter 'key'".to_string(),
                    StepErrorKind::ActionFailed,
                    t,
                );
            }
        };
        if let Err(err) = self.platform.key_press(&chord) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        self.succeed(action, Vec::new(), t)
    }

    fn scroll(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let amount = action.param_i64("amount").unwrap_or(3) as i32;
        let signed = match action.param_str("direction") {
            Some("up") => amount,
            _ => -amount,
        };
        let (cx, cy) = zone.aim_point();
        if let Err(err) = self.platform.scroll(cx, cy, signed) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        self.succeed(action, Vec::new(), t)
    }

    fn move_cursor(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let (cx, cy) = zone.aim_point();
        if let Err(err) = self.platform.move_cursor(cx, cy) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        self.succeed(action, Vec::new(), t)
    }

    // Drag is a primitive: explicit from/to parameters, defaulting the
    // start to the zone aim point.
    fn drag(&self, action: Action, zone: Zone, t: u64) -> ActionResult {
        let (default_x, default_y) = zone.aim_point();
        let from_x = action.param_i64("from_x").unwrap_or(default_x as i64) as i32;
        let from_y = action.param_i64("from_y").unwrap_or(default_y as i64) as i32;
        let (to_x, to_y) = match (action.param_i64("to_x"), action.param_i64("to_y")) {
            (Some(x), Some(y)) => (x as i32, y as i32),
            _ => {
                return self.fail(
                    action,
                    "missing required parameters 'to_x'/'to_y'".to_string(),
                    StepErrorKind::ActionFailed,
                    t,
                );
            }
        };
        if let Err(err) = self.platform.drag(from_x, from_y, to_x, to_y) {
            return self.fail(action, err.to_string(), StepErrorKind::PlatformError, t);
        }
        self.succeed(action, Vec::new(), t)
    }

    fn succeed(&self, mut action: Action, events: Vec<SpatialEvent>, t: u64) -> ActionResult {
        action.status = ActionStatus::Completed;
        ActionResult {
            action,
            success: true,
            events,
            error: String::new(),
            error_kind: None,
            timestamp_ms: t,
        }
    }

    fn fail(&self, mut action: Action, error: String, kind: StepErrorKind, t: u64) -> ActionResult {
        action.status = ActionStatus::Failed;
        error!(kind = %kind, %error, "action failed");
        ActionResult {
            action,
            success: false,
            events: Vec::new(),
            error,
            error_kind: Some(kind),
            timestamp_ms: t,
        }
    }
}

/// Explicit x/y parameters win over the zone aim point.
fn click_point(action: &Action, zone: &Zone) -> (i32, i32) {
    match (action.param_i64("x"), action.param_i64("y")) {
        (Some(x), Some(y)) => (x as i32, y as i32),
        _ => zone.aim_point(),
    }
}
