pub mod mock;

use anyhow::Result;
use image::RgbaImage;

use crate::models::MouseButton;

/// Capability set every OS backend must provide.
///
/// All coordinates are logical (DPI-normalized) screen pixels with the
/// origin at the top-left of the primary display. The core is
/// polymorphic over this trait and never names a concrete backend.
pub trait PlatformAdapter: Send + Sync {
    /// Grab the current screen contents.
    fn capture_frame(&self) -> Result<RgbaImage>;

    /// Cursor position as reported by the OS, not inferred from vision.
    fn get_cursor_pos(&self) -> Result<(i32, i32)>;

    fn move_cursor(&self, x: i32, y: i32) -> Result<()>;

    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;

    fn double_click(&self, x: i32, y: i32) -> Result<()>;

    /// `amount` is platform-normalized scroll ticks; positive scrolls up.
    fn scroll(&self, x: i32, y: i32, amount: i32) -> Result<()>;

    fn type_text(&self, text: &str) -> Result<()>;

    /// Chord syntax: modifiers joined by `+`, e.g. `ctrl+shift+s`.
    /// Named keys: `win`, `enter`, `esc`, `tab`, `f1`..`f12`, arrows.
    fn key_press(&self, chord: &str) -> Result<()>;

    /// Press at `(from)`, move to `(to)`, release. Backs the primitive
    /// drag action.
    fn drag(&self, from_x: i32, from_y: i32, to_x: i32, to_y: i32) -> Result<()>;

    fn get_screen_size(&self) -> Result<(u32, u32)>;

    fn name(&self) -> &str {
        "unknown"
    }
}

/// Create the platform backend for the current environment.
///
/// Per-OS implementations live outside the core crate; without one
/// compiled in, the recording mock is returned so the agent stays
/// drivable headlessly.
pub fn create_platform() -> std::sync::Arc<dyn PlatformAdapter> {
    std::sync::Arc::new(mock::MockPlatform::new(1920, 1080))
}
