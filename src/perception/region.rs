use std::sync::Arc;

use image::GrayImage;
use tracing::debug;

use crate::capture::Frame;
use crate::config::Settings;
use crate::models::{Rect, Zone, ZoneKind, ZoneState};

// Gradient magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: i32 = 40;

// Padding around the analysis crop; a control flush against the bbox
// edge still shows its boundary transition inside the crop.
const CROP_PAD: i32 = 8;

// Smallest component edge, in pixels, worth reporting as a zone.
const MIN_COMPONENT_SIZE: u32 = 10;

// Components at most this large on both axes read as icons.
const ICON_MAX_SIZE: u32 = 48;

// Aspect ratio (w/h) past which a short component reads as a text field.
const TEXT_FIELD_MIN_ASPECT: f32 = 3.0;
const TEXT_FIELD_MAX_HEIGHT: u32 = 40;

/// Mid-tier analyzer: local image primitives over a changed
/// sub-rectangle, producing candidate zones without touching any
/// remote service.
pub struct RegionAnalyzer {
    settings: Arc<Settings>,
}

impl RegionAnalyzer {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Detect candidate zones inside `bbox`. Returned bounds are
    /// absolute screen coordinates clipped to the bbox; candidates
    /// below the confidence floor are discarded. Never fails.
    pub fn analyze(&self, frame: &Frame, bbox: Rect, now_ms: u64) -> Vec<Zone> {
        let clipped = match clip_to_frame(bbox, frame.width(), frame.height()) {
            Some(r) => r,
            None => return Vec::new(),
        };
        if clipped.width < MIN_COMPONENT_SIZE || clipped.height < MIN_COMPONENT_SIZE {
            return Vec::new();
        }
        let crop = clip_to_frame(
            Rect::new(
                clipped.x - CROP_PAD,
                clipped.y - CROP_PAD,
                clipped.width + 2 * CROP_PAD as u32,
                clipped.height + 2 * CROP_PAD as u32,
            ),
            frame.width(),
            frame.height(),
        )
        .unwrap_or(clipped);

        let gray = crop_luma(&frame.image, &crop);
        let edges = edge_mask(&gray);
        let components = connected_components(&edges, gray.width(), gray.height());

        let mut zones: Vec<Zone> = Vec::new();
        for component in components {
            if zones.len() >= self.settings.max_zones_per_region {
                break;
            }
            let absolute = Rect::new(
                crop.x + component.bounds.x,
                crop.y + component.bounds.y,
                component.bounds.width,
                component.bounds.height,
            );
            // Candidates stay inside the changed bbox.
            let bounds = match absolute.intersect(&clipped) {
                Some(bounds) => bounds,
                None => continue,
            };
            if bounds.width < MIN_COMPONENT_SIZE || bounds.height < MIN_COMPONENT_SIZE {
                continue;
            }

            // Edge density inside the box is the confidence signal: a
            // crisp rectangular control fills its outline, noise does not.
            let density = component.pixel_count as f32 / bounds.area().max(1) as f32;
            let confidence = (0.35 + density * 1.5).min(0.65);
            if confidence < self.settings.min_zone_confidence {
                continue;
            }

            let kind = classify_shape(&bounds);
            let id = format!(
                "zone_r{}_{}_{}x{}",
                bounds.x, bounds.y, bounds.width, bounds.height
            );
            zones.push(Zone {
                label: format!("{:?} at ({}, {})", kind, bounds.x, bounds.y),
                id,
                kind,
                state: ZoneState::Enabled,
                bounds,
                confidence,
                parent_id: None,
                last_seen: now_ms,
            });
        }

        debug!(
            region = ?clipped,
            candidates = zones.len(),
            "region analysis complete"
        );
        zones
    }
}

fn clip_to_frame(bbox: Rect, width: u32, height: u32) -> Option<Rect> {
    let x0 = bbox.x.max(0);
    let y0 = bbox.y.max(0);
    let x1 = (bbox.x + bbox.width as i32).min(width as i32);
    let y1 = (bbox.y + bbox.height as i32).min(height as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn crop_luma(img: &image::RgbaImage, region: &Rect) -> GrayImage {
    let mut gray = GrayImage::new(region.width, region.height);
    for y in 0..region.height {
        for x in 0..region.width {
            let pixel = img.get_pixel(region.x as u32 + x, region.y as u32 + y);
            let [r, g, b, _] = pixel.0;
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8;
            gray.put_pixel(x, y, image::Luma([luma]));
        }
    }
    gray
}

// First-difference gradient magnitude, thresholded to a binary mask.
fn edge_mask(gray: &GrayImage) -> Vec<bool> {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    let mut mask = vec![false; width * height];
    for y in 0..height {
        for x in 0..width {
            let here = gray.get_pixel(x as u32, y as u32).0[0] as i32;
            let right = if x + 1 < width {
                gray.get_pixel(x as u32 + 1, y as u32).0[0] as i32
            } else {
                here
            };
            let below = if y + 1 < height {
                gray.get_pixel(x as u32, y as u32 + 1).0[0] as i32
            } else {
                here
            };
            if (here - right).abs() + (here - below).abs() > EDGE_THRESHOLD {
                mask[y * width + x] = true;
            }
        }
    }
    mask
}

struct Component {
    bounds: Rect,
    pixel_count: u32,
}

// Flood-fill over the edge mask with 8-connectivity, largest first.
fn connected_components(mask: &[bool], width: u32, height: u32) -> Vec<Component> {
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; w * h];
    let mut components = Vec::new();

    for start in 0..w * h {
        if !mask[start] || visited[start] {
            continue;
        }
        let mut queue = vec![start];
        visited[start] = true;
        let (mut min_x, mut min_y) = (start % w, start / w);
        let (mut max_x, mut max_y) = (min_x, min_y);
        let mut count: u32 = 0;

        while let Some(idx) = queue.pop() {
            count += 1;
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        queue.push(nidx);
                    }
                }
            }
        }

        components.push(Component {
            bounds: Rect::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
            ),
            pixel_count: count,
        });
    }

    components.sort_by(|a, b| b.bounds.area().cmp(&a.bounds.area()));
    components
}

fn classify_shape(bounds: &Rect) -> ZoneKind {
    if bounds.width <= ICON_MAX_SIZE && bounds.height <= ICON_MAX_SIZE {
        return ZoneKind::Icon;
    }
    let aspect = bounds.width as f32 / bounds.height.max(1) as f32;
    if aspect >= TEXT_FIELD_MIN_ASPECT && bounds.height <= TEXT_FIELD_MAX_HEIGHT {
        return ZoneKind::TextField;
    }
    ZoneKind::Button
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn frame_with_box(x0: u32, y0: u32, w: u32, h: u32) -> Frame {
        let mut img = RgbaImage::from_pixel(320, 240, Rgba([20, 20, 20, 255]));
        // Draw a filled bright rectangle; its outline produces edges.
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgba([230, 230, 230, 255]));
            }
        }
        Frame::new(img, 0, (0, 0), 0)
    }

    fn analyzer() -> RegionAnalyzer {
        RegionAnalyzer::new(Arc::new(Settings::default()))
    }

    #[test]
    fn detects_rectangle_inside_bbox() {
        let frame = frame_with_box(40, 40, 120, 30);
        let zones = analyzer().analyze(&frame, Rect::new(0, 0, 320, 240), 42);
        assert!(!zones.is_empty());
        let z = &zones[0];
        assert!(z.bounds.contains_point(50, 41));
        assert!(z.confidence >= 0.4);
        assert_eq!(z.last_seen, 42);
    }

    #[test]
    fn bounds_are_clipped_to_bbox() {
        let frame = frame_with_box(40, 40, 120, 30);
        let bbox = Rect::new(30, 30, 100, 100);
        let zones = analyzer().analyze(&frame, bbox, 0);
        for z in &zones {
            assert!(z.bounds.x >= bbox.x);
            assert!(z.bounds.y >= bbox.y);
            assert!(z.bounds.x + z.bounds.width as i32 <= bbox.x + bbox.width as i32);
        }
    }

    #[test]
    fn blank_region_yields_nothing() {
        let frame = Frame::new(RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255])), 0, (0, 0), 0);
        let zones = analyzer().analyze(&frame, Rect::new(0, 0, 64, 64), 0);
        assert!(zones.is_empty());
    }

    #[test]
    fn degenerate_bbox_yields_nothing() {
        let frame = frame_with_box(10, 10, 50, 50);
        assert!(analyzer()
            .analyze(&frame, Rect::new(-500, -500, 5, 5), 0)
            .is_empty());
    }
}
