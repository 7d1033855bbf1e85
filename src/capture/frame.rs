use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

/// One timestamped screen sample plus the cursor position taken in the
/// same sample window. Immutable after production.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub timestamp_ms: u64,
    pub cursor: (i32, i32),
    pub frame_number: u64,
}

impl Frame {
    pub fn new(image: RgbaImage, timestamp_ms: u64, cursor: (i32, i32), frame_number: u64) -> Self {
        Self {
            image,
            timestamp_ms,
            cursor,
            frame_number,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Bounded frame store with drop-oldest semantics.
///
/// The capture thread is the only producer; consumers take the lock
/// briefly and get `Arc` handles out, never references into the ring.
#[derive(Debug)]
pub struct FrameRing {
    frames: Mutex<VecDeque<Arc<Frame>>>,
    capacity: usize,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, frame: Arc<Frame>) {
        let mut frames = self.frames.lock().unwrap();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.lock().unwrap().back().cloned()
    }

    /// The two most recent frames, oldest first.
    pub fn latest_pair(&self) -> Option<(Arc<Frame>, Arc<Frame>)> {
        let frames = self.frames.lock().unwrap();
        let n = frames.len();
        if n < 2 {
            return None;
        }
        Some((frames[n - 2].clone(), frames[n - 1].clone()))
    }

    /// Frames with `from_ms <= timestamp_ms <= to_ms`, oldest first.
    pub fn range(&self, from_ms: u64, to_ms: u64) -> Vec<Arc<Frame>> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.timestamp_ms >= from_ms && f.timestamp_ms <= to_ms)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64, t: u64) -> Arc<Frame> {
        Arc::new(Frame::new(RgbaImage::new(4, 4), t, (0, 0), n))
    }

    #[test]
    fn ring_drops_oldest_when_full() {
        let ring = FrameRing::new(3);
        for n in 0..5 {
            ring.push(frame(n, n * 10));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.latest().unwrap().frame_number, 4);
        let all = ring.range(0, 1_000);
        assert_eq!(all.first().unwrap().frame_number, 2);
    }

    #[test]
    fn range_filters_by_timestamp() {
        let ring = FrameRing::new(10);
        for n in 0..5 {
            ring.push(frame(n, n * 10));
        }
        let mid = ring.range(10, 30);
        let numbers: Vec<u64> = mid.iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn latest_pair_orders_oldest_first() {
        let ring = FrameRing::new(4);
        assert!(ring.latest_pair().is_none());
        ring.push(frame(0, 0));
        ring.push(frame(1, 10));
        let (a, b) = ring.latest_pair().unwrap();
        assert_eq!((a.frame_number, b.frame_number), (0, 1));
    }
}
