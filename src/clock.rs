use std::time::Instant;

/// Monotonic millisecond clock anchored at agent construction.
///
/// Every timestamp in the system (frames, spatial events, zone
/// `last_seen`) comes from one `Clock` value so they are mutually
/// comparable. Copyable so each component can hold its own handle.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
