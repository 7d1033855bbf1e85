use std::sync::Arc;

use image::GrayImage;
use img_hash::{HashAlg, Hasher, HasherConfig, ImageHash};
use tracing::debug;

use crate::capture::Frame;
use crate::config::Settings;
use crate::models::Rect;

/// Classification of the change between two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameChange {
    /// Below the noise floor.
    Idle,
    /// Small change centered on the cursor.
    CursorOnly,
    /// Localized change worth a local region pass.
    MinorUpdate,
    /// Large-scale change; the whole canvas needs a rebuild.
    ContentChange,
    /// The screen is still settling; wait before acting.
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeOutcome {
    pub change: FrameChange,
    /// Changed-pixel fraction in percent (0..=100).
    pub changed_percent: f32,
    /// Union of changed blocks; `None` when idle.
    pub bbox: Option<Rect>,
}

// Square block edge for the luminance diff grid.
const BLOCK_SIZE: u32 = 16;

// Mean per-pixel luminance delta a block must exceed to count as changed.
const BLOCK_DIFF_THRESHOLD: f32 = 12.0;

// Margin around the changed bbox for the cursor-proximity test.
const CURSOR_MARGIN: i32 = 50;

// Hamming distance on the 64-bit gradient hash that flags a different
// screen identity regardless of the pixel-diff fraction.
const HASH_IDENTITY_DISTANCE: u32 = 24;

// A minor update's bbox may cover at most this fraction of the screen.
const MINOR_BBOX_MAX_FRACTION: f64 = 0.40;

/// Tier-0 change classifier over consecutive frame pairs.
///
/// Stateful: it keeps the previous frame's perceptual hash for the
/// screen-identity heuristic and the time of the last unstable
/// classification for transition debouncing. Given the same state and
/// frame pair, the classification is deterministic.
pub struct ChangeClassifier {
    settings: Arc<Settings>,
    hasher: Hasher,
    last_hash: Option<ImageHash>,
    last_unstable_at_ms: Option<u64>,
}

impl ChangeClassifier {
    pub fn new(settings: Arc<Settings>) -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(8, 8)
            .to_hasher();
        Self {
            settings,
            hasher,
            last_hash: None,
            last_unstable_at_ms: None,
        }
    }

    /// Classify the change from `prev` to `curr`.
    ///
    /// Tie-break order: Idle, CursorOnly, MinorUpdate, ContentChange,
    /// with Transitioning overriding the last two while changes keep
    /// arriving inside the stability window.
    pub fn classify(&mut self, prev: &Frame, curr: &Frame) -> ChangeOutcome {
        let hash = self.hasher.hash_image(&curr.image);
        let hash_distance = self.last_hash.as_ref().map(|previous| previous.dist(&hash));
        self.last_hash = Some(hash);

        if prev.width() != curr.width() || prev.height() != curr.height() {
            return self.unstable_or(curr, FrameChange::ContentChange, 100.0, None);
        }

        let (changed_percent, bbox) = block_diff(&prev.image, &curr.image);

        if changed_percent < self.settings.diff_threshold_percent {
            self.last_unstable_at_ms = None;
            return ChangeOutcome {
                change: FrameChange::Idle,
                changed_percent,
                bbox: None,
            };
        }

        let bbox = bbox.expect("non-idle diff has a bbox");

        if self.is_cursor_only(&bbox, curr.cursor) {
            return ChangeOutcome {
                change: FrameChange::CursorOnly,
                changed_percent,
                bbox: Some(bbox),
            };
        }

        let screen_area = (curr.width() as u64 * curr.height() as u64) as f64;
        let identity_shift = hash_distance.map_or(false, |d| d >= HASH_IDENTITY_DISTANCE);
        let content_change = changed_percent >= self.settings.tier2_threshold_percent
            || identity_shift
            || bbox.area() as f64 > screen_area * MINOR_BBOX_MAX_FRACTION;

        let change = if content_change {
            FrameChange::ContentChange
        } else {
            FrameChange::MinorUpdate
        };
        debug!(
            ?change,
            changed_percent, ?hash_distance, "frame change classified"
        );
        self.unstable_or(curr, change, changed_percent, Some(bbox))
    }

    /// Forget the transition debounce, e.g. after a forced recapture.
    pub fn reset(&mut self) {
        self.last_hash = None;
        self.last_unstable_at_ms = None;
    }

    fn is_cursor_only(&self, bbox: &Rect, cursor: (i32, i32)) -> bool {
        if bbox.area() >= self.settings.cursor_diff_area_ceiling as u64 {
            return false;
        }
        let inflated = Rect::new(
            bbox.x - CURSOR_MARGIN,
            bbox.y - CURSOR_MARGIN,
            bbox.width + 2 * CURSOR_MARGIN as u32,
            bbox.height + 2 * CURSOR_MARGIN as u32,
        );
        inflated.contains_point(cursor.0, cursor.1)
    }

    // Changes arriving inside the stability window are reported as
    // Transitioning so callers wait for the screen to settle; the first
    // change of a burst passes through.
    fn unstable_or(
        &mut self,
        curr: &Frame,
        change: FrameChange,
        changed_percent: f32,
        bbox: Option<Rect>,
    ) -> ChangeOutcome {
        let within_window = self.last_unstable_at_ms.map_or(false, |t| {
            curr.timestamp_ms.saturating_sub(t) < self.settings.stability_wait_ms
        });
        self.last_unstable_at_ms = Some(curr.timestamp_ms);
        ChangeOutcome {
            change: if within_window {
                FrameChange::Transitioning
            } else {
                change
            },
            changed_percent,
            bbox,
        }
    }
}

/// Fraction of changed 16x16 blocks (luminance-weighted) and their
/// union bounding box.
fn block_diff(a: &image::RgbaImage, b: &image::RgbaImage) -> (f32, Option<Rect>) {
    let gray_a = to_luma(a);
    let gray_b = to_luma(b);
    let (width, height) = (gray_a.width(), gray_a.height());

    let mut changed_blocks: u32 = 0;
    let mut total_blocks: u32 = 0;
    let mut bbox: Option<Rect> = None;

    let mut by = 0;
    while by < height {
        let bh = BLOCK_SIZE.min(height - by);
        let mut bx = 0;
        while bx < width {
            let bw = BLOCK_SIZE.min(width - bx);
            total_blocks += 1;

            let mut sum: u64 = 0;
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let pa = gray_a.get_pixel(x, y).0[0] as i32;
                    let pb = gray_b.get_pixel(x, y).0[0] as i32;
                    sum += (pa - pb).unsigned_abs() as u64;
                }
            }
            let mean = sum as f32 / (bw * bh) as f32;
            if mean > BLOCK_DIFF_THRESHOLD {
                changed_blocks += 1;
                let block = Rect::new(bx as i32, by as i32, bw, bh);
                bbox = Some(match bbox {
                    Some(acc) => acc.union(&block),
                    None => block,
                });
            }
            bx += BLOCK_SIZE;
        }
        by += BLOCK_SIZE;
    }

    if total_blocks == 0 {
        return (0.0, None);
    }
    (changed_blocks as f32 / total_blocks as f32 * 100.0, bbox)
}

fn to_luma(img: &image::RgbaImage) -> GrayImage {
    let mut gray = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        // ITU-R BT.601 luma weights.
        let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8;
        gray.put_pixel(x, y, image::Luma([luma]));
    }
    gray
}
