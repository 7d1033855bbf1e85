use std::sync::Arc;

use crate::config::Settings;
use crate::models::Rect;

// Pacing assumes waypoints are consumed at this rate.
const ASSUMED_FPS: f32 = 60.0;

// Waypoint bounds for a single trajectory.
const MAX_WAYPOINTS: usize = 200;
const MIN_WAYPOINTS: usize = 2;

// Pixel gap between scan lines in an exploratory sweep.
const DEFAULT_SCAN_SPACING: i32 = 50;

// Recursion guard for detour routing.
const MAX_ROUTE_DEPTH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryKind {
    /// Straight interpolation to the target.
    Direct,
    /// Detours around zones marked as avoid.
    Safe,
    /// Lawnmower sweep across a region to elicit hover tooltips.
    Exploratory,
}

/// An ordered sequence of intermediate cursor positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub kind: TrajectoryKind,
    pub points: Vec<(i32, i32)>,
}

impl Trajectory {
    /// Total euclidean path length in pixels.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| distance(pair[0], pair[1]))
            .sum()
    }
}

/// Pure, deterministic trajectory generator.
///
/// Consecutive step size is bounded so traversal at the assumed
/// waypoint rate stays at or under `motion_speed_pixels_per_sec`.
pub struct MotionPlanner {
    settings: Arc<Settings>,
}

impl MotionPlanner {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Straight line from `from` to `to`.
    pub fn plan_direct(&self, from: (i32, i32), to: (i32, i32)) -> Trajectory {
        let steps = self.steps_for_distance(distance(from, to));
        Trajectory {
            kind: TrajectoryKind::Direct,
            points: interpolate(from, to, steps),
        }
    }

    /// Route to `to` without crossing any of `avoid`.
    pub fn plan_safe(&self, from: (i32, i32), to: (i32, i32), avoid: &[Rect]) -> Trajectory {
        let waypoints = route_around(from, to, avoid, 0);

        let mut points: Vec<(i32, i32)> = Vec::new();
        for leg in waypoints.windows(2) {
            let steps = self.steps_for_distance(distance(leg[0], leg[1]));
            let segment = interpolate(leg[0], leg[1], steps);
            if points.is_empty() {
                points.extend(segment);
            } else {
                points.extend(segment.into_iter().skip(1));
            }
        }
        if points.len() > MAX_WAYPOINTS {
            points = downsample(&points, MAX_WAYPOINTS);
        }
        Trajectory {
            kind: TrajectoryKind::Safe,
            points,
        }
    }

    /// Horizontal lawnmower sweep over `region`, alternating direction
    /// per row.
    pub fn plan_exploratory(&self, from: (i32, i32), region: Rect) -> Trajectory {
        if region.area() == 0 {
            return Trajectory {
                kind: TrajectoryKind::Exploratory,
                points: vec![from],
            };
        }

        let left = region.x;
        let right = region.x + region.width as i32;
        let mut scan_points: Vec<(i32, i32)> = Vec::new();
        let mut y = region.y;
        let mut row = 0u32;
        while y <= region.y + region.height as i32 {
            if row % 2 == 0 {
                scan_points.push((left, y));
                scan_points.push((right, y));
            } else {
                scan_points.push((right, y));
                scan_points.push((left, y));
            }
            y += DEFAULT_SCAN_SPACING;
            row += 1;
        }

        let mut points = interpolate(from, scan_points[0], self.steps_for_distance(distance(from, scan_points[0])));
        for leg in scan_points.windows(2) {
            let steps = self.steps_for_distance(distance(leg[0], leg[1]));
            points.extend(interpolate(leg[0], leg[1], steps).into_iter().skip(1));
        }
        if points.len() > MAX_WAYPOINTS {
            points = downsample(&points, MAX_WAYPOINTS);
        }
        Trajectory {
            kind: TrajectoryKind::Exploratory,
            points,
        }
    }

    /// Estimated traversal time at the configured motion speed.
    pub fn estimate_duration_ms(&self, trajectory: &Trajectory) -> u64 {
        let speed = self.settings.motion_speed_pixels_per_sec;
        if speed <= 0.0 || trajectory.points.len() < 2 {
            return 0;
        }
        (trajectory.length() / speed as f64 * 1_000.0) as u64
    }

    /// Delay between consecutive waypoint moves that keeps the
    /// effective speed at the configured limit.
    pub fn pacing_interval_ms(&self) -> u64 {
        (1_000.0 / ASSUMED_FPS) as u64
    }

    fn steps_for_distance(&self, dist: f64) -> usize {
        let speed = self.settings.motion_speed_pixels_per_sec;
        if speed <= 0.0 || dist <= 0.0 {
            return MIN_WAYPOINTS;
        }
        let travel_seconds = dist / speed as f64;
        ((travel_seconds * ASSUMED_FPS as f64).round() as usize).clamp(MIN_WAYPOINTS, MAX_WAYPOINTS)
    }
}

fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (b.0 - a.0) as f64;
    let dy = (b.1 - a.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn interpolate(from: (i32, i32), to: (i32, i32), steps: usize) -> Vec<(i32, i32)> {
    let steps = steps.max(MIN_WAYPOINTS);
    let mut points = Vec::with_capacity(steps);
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        points.push((
            (from.0 as f64 + (to.0 - from.0) as f64 * t).round() as i32,
            (from.1 as f64 + (to.1 - from.1) as f64 * t).round() as i32,
        ));
    }
    points
}

/// Liang-Barsky segment/rectangle intersection.
pub fn segment_intersects_rect(p1: (i32, i32), p2: (i32, i32), rect: &Rect) -> bool {
    if rect.area() == 0 {
        return false;
    }
    let (x1, y1) = (p1.0 as f64, p1.1 as f64);
    let (x2, y2) = (p2.0 as f64, p2.1 as f64);
    let dx = x2 - x1;
    let dy = y2 - y1;

    let x_min = rect.x as f64;
    let x_max = (rect.x + rect.width as i32) as f64;
    let y_min = rect.y as f64;
    let y_max = (rect.y + rect.height as i32) as f64;

    let p = [-dx, dx, -dy, dy];
    let q = [x1 - x_min, x_max - x1, y1 - y_min, y_max - y1];

    let mut t_enter = 0.0f64;
    let mut t_exit = 1.0f64;
    for (pi, qi) in p.iter().zip(q.iter()) {
        if *pi == 0.0 {
            if *qi < 0.0 {
                return false;
            }
        } else {
            let t = qi / pi;
            if *pi < 0.0 {
                t_enter = t_enter.max(t);
            } else {
                t_exit = t_exit.min(t);
            }
            if t_enter > t_exit {
                return false;
            }
        }
    }
    t_enter <= t_exit
}

fn route_around(
    from: (i32, i32),
    to: (i32, i32),
    avoid: &[Rect],
    depth: u32,
) -> Vec<(i32, i32)> {
    if depth >= MAX_ROUTE_DEPTH {
        return vec![from, to];
    }
    let blocker = avoid
        .iter()
        .find(|rect| segment_intersects_rect(from, to, rect));
    let blocker = match blocker {
        Some(rect) => rect,
        None => return vec![from, to],
    };

    let detour = match detour_point(from, to, blocker) {
        Some(point) => point,
        None => return vec![from, to],
    };
    let mut first = route_around(from, detour, avoid, depth + 1);
    let second = route_around(detour, to, avoid, depth + 1);
    first.extend(second.into_iter().skip(1));
    first
}

// Candidate detour waypoints sit just outside each edge midpoint and
// each corner of the blocker. The cheapest candidate reachable from
// `from` without re-crossing the blocker wins; the leg onward to `to`
// is handled by recursion.
fn detour_point(from: (i32, i32), to: (i32, i32), blocker: &Rect) -> Option<(i32, i32)> {
    let margin = 10;
    let left = blocker.x - margin;
    let right = blocker.x + blocker.width as i32 + margin;
    let top = blocker.y - margin;
    let bottom = blocker.y + blocker.height as i32 + margin;
    let (cx, cy) = blocker.center();

    let candidates = [
        (cx, top),
        (cx, bottom),
        (left, cy),
        (right, cy),
        (left, top),
        (right, top),
        (left, bottom),
        (right, bottom),
    ];

    candidates
        .iter()
        .filter(|p| **p != from && !segment_intersects_rect(from, **p, blocker))
        .min_by(|a, b| {
            let cost_a = distance(from, **a) + distance(**a, to);
            let cost_b = distance(from, **b) + distance(**b, to);
            cost_a.partial_cmp(&cost_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
}

fn downsample(points: &[(i32, i32)], max_count: usize) -> Vec<(i32, i32)> {
    if points.len() <= max_count || max_count < 2 {
        return points.to_vec();
    }
    let mut result = vec![points[0]];
    let step = (points.len() - 1) as f64 / (max_count - 1) as f64;
    for i in 1..max_count - 1 {
        result.push(points[(i as f64 * step).round() as usize]);
    }
    result.push(*points.last().unwrap());
    result
}
