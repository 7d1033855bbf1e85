use serde::{Deserialize, Serialize};

/// Machine-readable failure categories surfaced by step execution.
///
/// Component-local failures are folded into one of these at the
/// component boundary; the director maps them to recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    ZoneNotFound,
    ActionFailed,
    BrushLost,
    Timeout,
    ParseError,
    UnsupportedGlobalAction,
    PlanInvalid,
    BudgetExhausted,
    /// Unexpected platform adapter failure.
    PlatformError,
}

impl StepErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepErrorKind::ZoneNotFound => "zone_not_found",
            StepErrorKind::ActionFailed => "action_failed",
            StepErrorKind::BrushLost => "brush_lost",
            StepErrorKind::Timeout => "timeout",
            StepErrorKind::ParseError => "parse_error",
            StepErrorKind::UnsupportedGlobalAction => "unsupported_global_action",
            StepErrorKind::PlanInvalid => "plan_invalid",
            StepErrorKind::BudgetExhausted => "budget_exhausted",
            StepErrorKind::PlatformError => "platform_error",
        }
    }
}

impl std::fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
