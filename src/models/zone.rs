use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in logical screen pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "w")]
    pub width: u32,
    #[serde(alias = "h")]
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px <= self.x + self.width as i32
            && py >= self.y
            && py <= self.y + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Interiors share at least one point; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.area() == 0 || other.area() == 0 {
            return false;
        }
        !(self.x + self.width as i32 <= other.x
            || other.x + other.width as i32 <= self.x
            || self.y + self.height as i32 <= other.y
            || other.y + other.height as i32 <= self.y)
    }

    /// Euclidean distance from a point to the nearest edge of this
    /// rectangle; zero when the point is inside.
    pub fn distance_to_point(&self, px: i32, py: i32) -> f64 {
        let dx = (self.x - px).max(px - (self.x + self.width as i32)).max(0) as f64;
        let dy = (self.y - py).max(py - (self.y + self.height as i32)).max(0) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Overlapping area of two rectangles, `None` when disjoint.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width as i32).min(other.x + other.width as i32);
        let y1 = (self.y + self.height as i32).min(other.y + other.height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width as i32).max(other.x + other.width as i32);
        let y1 = (self.y + self.height as i32).max(other.y + other.height as i32);
        Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

/// UI role of a detected zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Button,
    TextField,
    MenuItem,
    Icon,
    Checkbox,
    Link,
    ScrollArea,
    Other,
}

impl ZoneKind {
    /// Map a wire string to a kind; anything unrecognized is `Other`.
    pub fn parse(s: &str) -> ZoneKind {
        match s {
            "button" => ZoneKind::Button,
            "text_field" => ZoneKind::TextField,
            "menu_item" => ZoneKind::MenuItem,
            "icon" => ZoneKind::Icon,
            "checkbox" => ZoneKind::Checkbox,
            "link" => ZoneKind::Link,
            "scroll_area" => ZoneKind::ScrollArea,
            _ => ZoneKind::Other,
        }
    }
}

/// Observable state of a zone at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Enabled,
    Disabled,
    Focused,
    Hovered,
    Pressed,
    Checked,
    Unchecked,
}

impl Default for ZoneState {
    fn default() -> Self {
        ZoneState::Enabled
    }
}

impl ZoneState {
    /// Map a wire string to a state; anything unrecognized is `Enabled`.
    pub fn parse(s: &str) -> ZoneState {
        match s {
            "disabled" => ZoneState::Disabled,
            "focused" => ZoneState::Focused,
            "hovered" => ZoneState::Hovered,
            "pressed" => ZoneState::Pressed,
            "checked" => ZoneState::Checked,
            "unchecked" => ZoneState::Unchecked,
            _ => ZoneState::Enabled,
        }
    }
}

/// A bounded screen region with interactive meaning.
///
/// Zones are discovered by the canvas mapper and targeted by the brush
/// controller. `parent_id` is a lookup key into the registry, not an
/// owning link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub label: String,
    pub kind: ZoneKind,
    #[serde(default)]
    pub state: ZoneState,
    pub bounds: Rect,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub last_seen: u64,
}

fn default_confidence() -> f32 {
    1.0
}

impl Zone {
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        self.bounds.contains_point(px, py)
    }

    /// Point the brush aims for: the bounds center.
    pub fn aim_point(&self) -> (i32, i32) {
        self.bounds.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(10, 10, 20, 20);
        assert!(r.contains_point(10, 10));
        assert!(r.contains_point(30, 30));
        assert!(!r.contains_point(31, 30));
    }

    #[test]
    fn rect_distance_inside_is_zero() {
        let r = Rect::new(0, 0, 100, 100);
        assert_eq!(r.distance_to_point(50, 50), 0.0);
        assert_eq!(r.distance_to_point(103, 0), 3.0);
    }

    #[test]
    fn rect_overlap_excludes_touching_edges() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(5, 5, 10, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn zone_kind_parse_maps_unknown_to_other() {
        assert_eq!(ZoneKind::parse("button"), ZoneKind::Button);
        assert_eq!(ZoneKind::parse("slider"), ZoneKind::Other);
        assert_eq!(ZoneState::parse("focused"), ZoneState::Focused);
        assert_eq!(ZoneState::parse("weird"), ZoneState::Enabled);
    }
}
