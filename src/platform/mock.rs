use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use image::RgbaImage;

use crate::models::MouseButton;

use super::PlatformAdapter;

/// One recorded platform call, kept for test assertions and replay.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    CaptureFrame,
    MoveCursor(i32, i32),
    Click(i32, i32, MouseButton),
    DoubleClick(i32, i32),
    Scroll(i32, i32, i32),
    TypeText(String),
    KeyPress(String),
    Drag(i32, i32, i32, i32),
}

struct MockState {
    cursor: (i32, i32),
    frames: VecDeque<RgbaImage>,
    calls: Vec<PlatformCall>,
    fail_captures: u32,
}

/// Recording platform backend.
///
/// Serves scripted frames (repeating the last one when the script runs
/// dry), tracks the cursor through `move_cursor`, and records every
/// input call so tests can assert on the exact interaction sequence.
pub struct MockPlatform {
    screen: (u32, u32),
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: (width, height),
            state: Mutex::new(MockState {
                cursor: (0, 0),
                frames: VecDeque::new(),
                calls: Vec::new(),
                fail_captures: 0,
            }),
        }
    }

    /// Queue a frame for the next `capture_frame` call.
    pub fn push_frame(&self, frame: RgbaImage) {
        self.state.lock().unwrap().frames.push_back(frame);
    }

    /// Make the next `n` capture calls fail.
    pub fn fail_next_captures(&self, n: u32) {
        self.state.lock().unwrap().fail_captures = n;
    }

    pub fn set_cursor(&self, x: i32, y: i32) {
        self.state.lock().unwrap().cursor = (x, y);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, call: PlatformCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn blank_frame(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.screen.0, self.screen.1, image::Rgba([0, 0, 0, 255]))
    }
}

impl PlatformAdapter for MockPlatform {
    fn capture_frame(&self) -> Result<RgbaImage> {
        let mut state = self.state.lock().unwrap();
        if state.fail_captures > 0 {
            state.fail_captures -= 1;
            return Err(anyhow!("mock capture failure"));
        }
        state.calls.push(PlatformCall::CaptureFrame);
        let frame = if state.frames.len() > 1 {
            state.frames.pop_front().unwrap()
        } else if let Some(front) = state.frames.front() {
            front.clone()
        } else {
            drop(state);
            return Ok(self.blank_frame());
        };
        Ok(frame)
    }

    fn get_cursor_pos(&self) -> Result<(i32, i32)> {
        Ok(self.state.lock().unwrap().cursor)
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cursor = (x, y);
        state.calls.push(PlatformCall::MoveCursor(x, y));
        Ok(())
    }

    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        self.record(PlatformCall::Click(x, y, button));
        Ok(())
    }

    fn double_click(&self, x: i32, y: i32) -> Result<()> {
        self.record(PlatformCall::DoubleClick(x, y));
        Ok(())
    }

    fn scroll(&self, x: i32, y: i32, amount: i32) -> Result<()> {
        self.record(PlatformCall::Scroll(x, y, amount));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(PlatformCall::TypeText(text.to_string()));
        Ok(())
    }

    fn key_press(&self, chord: &str) -> Result<()> {
        self.record(PlatformCall::KeyPress(chord.to_string()));
        Ok(())
    }

    fn drag(&self, from_x: i32, from_y: i32, to_x: i32, to_y: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cursor = (to_x, to_y);
        state.calls.push(PlatformCall::Drag(from_x, from_y, to_x, to_y));
        Ok(())
    }

    fn get_screen_size(&self) -> Result<(u32, u32)> {
        Ok(self.screen)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_cursor_updates_position() {
        let platform = MockPlatform::new(800, 600);
        platform.move_cursor(100, 200).unwrap();
        assert_eq!(platform.get_cursor_pos().unwrap(), (100, 200));
        assert_eq!(platform.calls(), vec![PlatformCall::MoveCursor(100, 200)]);
    }

    #[test]
    fn capture_serves_blank_when_unscripted() {
        let platform = MockPlatform::new(64, 48);
        let frame = platform.capture_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }

    #[test]
    fn capture_failure_injection_is_consumed() {
        let platform = MockPlatform::new(64, 48);
        platform.fail_next_captures(2);
        assert!(platform.capture_frame().is_err());
        assert!(platform.capture_frame().is_err());
        assert!(platform.capture_frame().is_ok());
    }
}
