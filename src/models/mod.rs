pub mod action;
pub mod error;
pub mod event;
pub mod task;
pub mod zone;

pub use action::{Action, ActionKind, ActionStatus, MouseButton};
pub use error::StepErrorKind;
pub use event::{SpatialEvent, SpatialEventKind};
pub use task::{TaskPlan, TaskStep, GLOBAL_ZONE, REPLAN_ZONE};
pub use zone::{Rect, Zone, ZoneKind, ZoneState};
