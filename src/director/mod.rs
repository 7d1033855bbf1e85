pub mod error;
pub mod planner;
pub mod step_executor;

pub use error::{ErrorClassification, ErrorClassifier, Recovery, Severity};
pub use planner::TaskPlanner;
pub use step_executor::{StepExecutor, StepResult};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::Settings;
use crate::models::{StepErrorKind, TaskPlan, TaskStep};
use crate::perception::CanvasMapper;
use crate::platform::PlatformAdapter;
use crate::registry::ZoneRegistry;

/// Final outcome of one task attempt.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_description: String,
    pub success: bool,
    pub steps_completed: usize,
    pub steps_total: usize,
    pub step_results: Vec<StepResult>,
    pub plans_used: u32,
    pub api_calls_used: u32,
    pub error: String,
    pub error_kind: Option<StepErrorKind>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
struct TaskFailure {
    error: String,
    kind: Option<StepErrorKind>,
}

impl TaskFailure {
    fn budget(error: &str) -> Self {
        Self {
            error: error.to_string(),
            kind: Some(StepErrorKind::BudgetExhausted),
        }
    }
}

// Counters for one task attempt. `completed_descriptions` is
// append-only and supplied verbatim to every replan request.
#[derive(Debug, Default)]
struct TaskState {
    api_calls_used: u32,
    replans_used: u32,
    plans_used: u32,
    steps_completed: usize,
    completed_descriptions: Vec<String>,
    step_results: Vec<StepResult>,
}

enum StepOutcome {
    Completed,
    Skipped,
    NeedsReplan { reanalyze: bool },
}

/// Top-level orchestrator: plan, execute, recapture, replan, retry —
/// all under the API budget.
pub struct Director {
    planner: TaskPlanner,
    step_executor: StepExecutor,
    classifier: ErrorClassifier,
    registry: Arc<ZoneRegistry>,
    mapper: Arc<CanvasMapper>,
    platform: Arc<dyn PlatformAdapter>,
    settings: Arc<Settings>,
}

impl Director {
    pub fn new(
        planner: TaskPlanner,
        step_executor: StepExecutor,
        registry: Arc<ZoneRegistry>,
        mapper: Arc<CanvasMapper>,
        platform: Arc<dyn PlatformAdapter>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            planner,
            step_executor,
            classifier: ErrorClassifier::new(),
            registry,
            mapper,
            platform,
            settings,
        }
    }

    /// Execute a natural-language task end-to-end.
    pub async fn execute_task(&self, task: &str) -> TaskResult {
        let started = Instant::now();
        let mut state = TaskState::default();
        info!(task, "task started");

        if self.settings.step_delay_seconds > 0.0 {
            self.signal_control().await;
        }

        let mut current_plan = match self.create_plan(task, &mut state).await {
            Ok(plan) => plan,
            Err(failure) => return self.finish(task, state, started, 0, Some(failure)),
        };

        let mut step_index = 0usize;
        while step_index < current_plan.steps.len() {
            let step = current_plan.steps[step_index].clone();

            // Adaptive replanning: abandon the remaining steps, look at
            // the fresh screen, plan the rest.
            if step.is_replan() {
                info!(step = step.step_number, "replan sentinel reached");
                match self.replan(task, &mut state, true).await {
                    Ok(plan) => {
                        current_plan = plan;
                        step_index = 0;
                        continue;
                    }
                    Err(failure) => {
                        return self.finish(
                            task,
                            state,
                            started,
                            current_plan.steps.len(),
                            Some(failure),
                        );
                    }
                }
            }

            if self.settings.step_delay_seconds > 0.0 {
                tokio::time::sleep(Duration::from_secs_f32(self.settings.step_delay_seconds))
                    .await;
            }

            match self.execute_with_recovery(&step, &mut state).await {
                Ok(StepOutcome::Completed) => {
                    state.steps_completed += 1;
                    state.completed_descriptions.push(step.description.clone());
                    step_index += 1;
                    // A step that likely changed the UI invalidates the
                    // zone map for the steps that follow it.
                    if step_index < current_plan.steps.len()
                        && self.settings.matches_recapture_keyword(&step.expected_change)
                    {
                        info!(
                            step = step.step_number,
                            expected_change = %step.expected_change,
                            "expected change suggests a UI transition, recapturing"
                        );
                        if let Err(failure) = self.recapture(&mut state).await {
                            return self.finish(
                                task,
                                state,
                                started,
                                current_plan.steps.len(),
                                Some(failure),
                            );
                        }
                    }
                }
                Ok(StepOutcome::Skipped) => {
                    warn!(step = step.step_number, "step skipped");
                    step_index += 1;
                }
                Ok(StepOutcome::NeedsReplan { reanalyze }) => {
                    match self.replan(task, &mut state, reanalyze).await {
                        Ok(plan) => {
                            current_plan = plan;
                            step_index = 0;
                        }
                        Err(failure) => {
                            return self.finish(
                                task,
                                state,
                                started,
                                current_plan.steps.len(),
                                Some(failure),
                            );
                        }
                    }
                }
                Err(failure) => {
                    return self.finish(
                        task,
                        state,
                        started,
                        current_plan.steps.len(),
                        Some(failure),
                    );
                }
            }
        }

        self.finish(task, state, started, current_plan.steps.len(), None)
    }

    // ------------------------------------------------------------------
    // Step execution and recovery
    // ------------------------------------------------------------------

    async fn execute_with_recovery(
        &self,
        step: &TaskStep,
        state: &mut TaskState,
    ) -> Result<StepOutcome, TaskFailure> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.step_executor.execute(step).await;
            state.step_results.push(result.clone());
            if result.success {
                info!(step = step.step_number, desc = %step.description, "step completed");
                return Ok(StepOutcome::Completed);
            }

            let kind = result.error_kind.unwrap_or(StepErrorKind::ActionFailed);
            let retries_exhausted = attempt + 1 >= self.settings.max_step_retries;
            let classification = self.classifier.classify(kind, retries_exhausted);
            warn!(
                step = step.step_number,
                %kind,
                attempt,
                recovery = ?classification.recovery,
                error = %result.error,
                "step failed"
            );

            match classification.recovery {
                Recovery::Retry => {
                    attempt += 1;
                }
                Recovery::Reanalyze => {
                    self.recapture(state).await?;
                    attempt += 1;
                }
                Recovery::Skip => return Ok(StepOutcome::Skipped),
                Recovery::Replan => {
                    return Ok(StepOutcome::NeedsReplan {
                        reanalyze: classification.reanalyze_canvas,
                    });
                }
                Recovery::Abort => {
                    return Err(TaskFailure {
                        error: format!("step {} failed: {}", step.step_number, result.error),
                        kind: Some(kind),
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    async fn create_plan(&self, task: &str, state: &mut TaskState) -> Result<TaskPlan, TaskFailure> {
        self.check_api_budget(state)?;
        let zones = self.registry.all();
        let plan = self
            .planner
            .plan(task, &zones, &state.completed_descriptions)
            .await;
        state.api_calls_used += plan.api_calls_used;
        state.plans_used += 1;

        if !plan.success {
            return Err(TaskFailure {
                error: format!("planning failed: {}", plan.error),
                kind: None,
            });
        }
        if plan.steps.is_empty() {
            return Err(TaskFailure {
                error: "planner returned an empty plan".to_string(),
                kind: None,
            });
        }
        // A plan that repeats an already-completed step would restart
        // the task from scratch; the planner contract forbids it.
        if let Some(repeated) = plan.steps.iter().find(|s| {
            !s.description.is_empty() && state.completed_descriptions.contains(&s.description)
        }) {
            error!(step = %repeated.description, "plan repeats a completed step");
            return Err(TaskFailure {
                error: format!("plan repeats completed step '{}'", repeated.description),
                kind: Some(StepErrorKind::PlanInvalid),
            });
        }
        Ok(plan)
    }

    // One replan round: bump the replan counter, optionally recapture,
    // request a fresh plan with completed-step context. An invalid
    // plan is itself replanned while the replan budget lasts.
    async fn replan(
        &self,
        task: &str,
        state: &mut TaskState,
        mut recapture_first: bool,
    ) -> Result<TaskPlan, TaskFailure> {
        loop {
            state.replans_used += 1;
            if state.replans_used > self.settings.max_replans {
                return Err(TaskFailure::budget("maximum replan attempts exceeded"));
            }
            if recapture_first {
                self.recapture(state).await?;
            }
            match self.create_plan(task, state).await {
                Ok(plan) => return Ok(plan),
                Err(failure) if failure.kind == Some(StepErrorKind::PlanInvalid) => {
                    let exhausted = state.replans_used >= self.settings.max_replans;
                    let classification =
                        self.classifier.classify(StepErrorKind::PlanInvalid, exhausted);
                    if classification.recovery == Recovery::Replan {
                        recapture_first = classification.reanalyze_canvas;
                        continue;
                    }
                    return Err(failure);
                }
                Err(failure) => return Err(failure),
            }
        }
    }

    // ------------------------------------------------------------------
    // Budget and recapture
    // ------------------------------------------------------------------

    fn check_api_budget(&self, state: &TaskState) -> Result<(), TaskFailure> {
        if state.api_calls_used >= self.settings.max_api_calls {
            return Err(TaskFailure::budget("API call budget exhausted"));
        }
        Ok(())
    }

    async fn recapture(&self, state: &mut TaskState) -> Result<usize, TaskFailure> {
        self.check_api_budget(state)?;
        state.api_calls_used += 1;
        let zone_count = self.mapper.recapture().await;
        info!(zone_count, "recapture complete");
        Ok(zone_count)
    }

    // ------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------

    // Trace a small circle with the cursor so the user sees the agent
    // take control before it starts acting.
    async fn signal_control(&self) {
        let center = match self.platform.get_cursor_pos() {
            Ok(pos) => pos,
            Err(_) => return,
        };
        const RADIUS: f64 = 30.0;
        for i in 0..=12 {
            let angle = i as f64 / 12.0 * std::f64::consts::TAU;
            let x = center.0 + (RADIUS * angle.cos()) as i32;
            let y = center.1 + (RADIUS * angle.sin()) as i32;
            let _ = self.platform.move_cursor(x, y);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = self.platform.move_cursor(center.0, center.1);
    }

    fn finish(
        &self,
        task: &str,
        state: TaskState,
        started: Instant,
        steps_total: usize,
        failure: Option<TaskFailure>,
    ) -> TaskResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        let (success, error, error_kind) = match failure {
            None => (true, String::new(), None),
            Some(failure) => (false, failure.error, failure.kind),
        };
        let result = TaskResult {
            task_description: task.to_string(),
            success,
            steps_completed: state.steps_completed,
            steps_total,
            step_results: state.step_results,
            plans_used: state.plans_used,
            api_calls_used: state.api_calls_used,
            error,
            error_kind,
            duration_ms,
        };
        info!(
            success = result.success,
            steps = result.steps_completed,
            plans = result.plans_used,
            api_calls = result.api_calls_used,
            duration_ms,
            "task finished"
        );
        result
    }
}
