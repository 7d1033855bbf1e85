use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

impl MouseButton {
    pub fn parse(s: &str) -> MouseButton {
        match s {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Kinds of atomic input actions the executor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    DoubleClick,
    TypeText,
    KeyPress,
    Scroll,
    Move,
    Drag,
}

impl ActionKind {
    /// Parse a planner action-type string. `None` for unrecognized input.
    pub fn parse(s: &str) -> Option<ActionKind> {
        match s {
            "click" => Some(ActionKind::Click),
            "double_click" => Some(ActionKind::DoubleClick),
            "type_text" => Some(ActionKind::TypeText),
            "key_press" => Some(ActionKind::KeyPress),
            "scroll" => Some(ActionKind::Scroll),
            "move" => Some(ActionKind::Move),
            "drag" => Some(ActionKind::Drag),
            _ => None,
        }
    }

    /// Kinds that target a zone and require the cursor to be verified
    /// inside its bounds before acting.
    pub fn is_zone_bearing(&self) -> bool {
        !matches!(self, ActionKind::KeyPress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One atomic input action, dispatched by the action executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub target_zone_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default = "pending")]
    pub status: ActionStatus,
}

fn pending() -> ActionStatus {
    ActionStatus::Pending
}

impl Action {
    pub fn new(kind: ActionKind, target_zone_id: Option<String>) -> Self {
        Self {
            kind,
            target_zone_id,
            parameters: BTreeMap::new(),
            status: ActionStatus::Pending,
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(Value::as_i64)
    }

    pub fn button(&self) -> MouseButton {
        self.param_str("button")
            .map(MouseButton::parse)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_parse_rejects_unknown() {
        assert_eq!(ActionKind::parse("click"), Some(ActionKind::Click));
        assert_eq!(ActionKind::parse("replan"), None);
        assert_eq!(ActionKind::parse(""), None);
    }

    #[test]
    fn key_press_is_not_zone_bearing() {
        assert!(!ActionKind::KeyPress.is_zone_bearing());
        assert!(ActionKind::Click.is_zone_bearing());
        assert!(ActionKind::Drag.is_zone_bearing());
    }

    #[test]
    fn button_defaults_to_left() {
        let a = Action::new(ActionKind::Click, Some("z1".into()));
        assert_eq!(a.button(), MouseButton::Left);
        let b = a.with_param("button", "right".into());
        assert_eq!(b.button(), MouseButton::Right);
    }
}
