use crate::models::StepErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What the director should do about a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-execute the same step.
    Retry,
    /// Request a new plan with completed-step context.
    Replan,
    /// Force a recapture, then retry the step.
    Reanalyze,
    /// Advance past the step.
    Skip,
    /// The task fails.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub kind: StepErrorKind,
    pub severity: Severity,
    pub recovery: Recovery,
    pub reanalyze_canvas: bool,
}

/// Pure mapping from a failed step outcome to a recovery kind.
///
/// The `retries_exhausted` flag selects between the two recovery
/// columns; the director owns the actual retry counters.
#[derive(Debug, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, kind: StepErrorKind, retries_exhausted: bool) -> ErrorClassification {
        use Recovery::*;
        use Severity::*;
        use StepErrorKind::*;

        let (severity, fresh, exhausted, reanalyze) = match kind {
            ZoneNotFound => (Medium, Replan, Abort, true),
            ActionFailed => (Low, Retry, Replan, false),
            BrushLost => (Medium, Reanalyze, Replan, true),
            Timeout => (Low, Retry, Replan, false),
            ParseError => (Low, Skip, Skip, false),
            UnsupportedGlobalAction => (High, Abort, Abort, false),
            PlanInvalid => (High, Replan, Abort, true),
            BudgetExhausted => (Critical, Abort, Abort, false),
            PlatformError => (Medium, Retry, Abort, false),
        };

        ErrorClassification {
            kind,
            severity,
            recovery: if retries_exhausted { exhausted } else { fresh },
            reanalyze_canvas: reanalyze,
        }
    }

    /// Escalation ladder used when a recovery itself keeps failing:
    /// Retry -> Replan -> Reanalyze -> Abort; Skip -> Abort.
    pub fn escalate(&self, recovery: Recovery) -> Recovery {
        match recovery {
            Recovery::Retry => Recovery::Replan,
            Recovery::Replan => Recovery::Reanalyze,
            Recovery::Reanalyze => Recovery::Abort,
            Recovery::Skip => Recovery::Abort,
            Recovery::Abort => Recovery::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_recovery_matrix() {
        let c = ErrorClassifier::new();
        let rows = [
            (StepErrorKind::ZoneNotFound, Recovery::Replan, Recovery::Abort, true),
            (StepErrorKind::ActionFailed, Recovery::Retry, Recovery::Replan, false),
            (StepErrorKind::BrushLost, Recovery::Reanalyze, Recovery::Replan, true),
            (StepErrorKind::Timeout, Recovery::Retry, Recovery::Replan, false),
            (StepErrorKind::ParseError, Recovery::Skip, Recovery::Skip, false),
            (
                StepErrorKind::UnsupportedGlobalAction,
                Recovery::Abort,
                Recovery::Abort,
                false,
            ),
            (StepErrorKind::PlanInvalid, Recovery::Replan, Recovery::Abort, true),
            (
                StepErrorKind::BudgetExhausted,
                Recovery::Abort,
                Recovery::Abort,
                false,
            ),
        ];
        for (kind, fresh, exhausted, reanalyze) in rows {
            let a = c.classify(kind, false);
            let b = c.classify(kind, true);
            assert_eq!(a.recovery, fresh, "{kind} fresh");
            assert_eq!(b.recovery, exhausted, "{kind} exhausted");
            assert_eq!(a.reanalyze_canvas, reanalyze, "{kind} reanalyze");
        }
    }

    #[test]
    fn budget_exhausted_is_critical() {
        let c = ErrorClassifier::new();
        assert_eq!(
            c.classify(StepErrorKind::BudgetExhausted, false).severity,
            Severity::Critical
        );
    }

    #[test]
    fn escalation_ladder_terminates_at_abort() {
        let c = ErrorClassifier::new();
        let mut recovery = Recovery::Retry;
        for _ in 0..10 {
            recovery = c.escalate(recovery);
        }
        assert_eq!(recovery, Recovery::Abort);
    }
}
