pub mod engine;
pub mod frame;

pub use engine::{CaptureLoop, CursorSample};
pub use frame::{Frame, FrameRing};
