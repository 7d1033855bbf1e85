use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::Settings;
use crate::models::{SpatialEvent, SpatialEventKind};
use crate::registry::ZoneRegistry;

const HISTORY_CAPACITY: usize = 1_000;

/// Converts cursor samples into ENTER/EXIT/HOVER events against the
/// registry.
///
/// The tracker only records and publishes; it never acts on events.
/// Emitted timestamps are strictly non-decreasing: a sample older than
/// the last one is clamped forward.
pub struct ZoneTracker {
    registry: Arc<ZoneRegistry>,
    settings: Arc<Settings>,
    current_zone_id: Option<String>,
    enter_at_ms: Option<u64>,
    hover_emitted: bool,
    last_sample_ms: u64,
    history: VecDeque<SpatialEvent>,
}

impl ZoneTracker {
    pub fn new(registry: Arc<ZoneRegistry>, settings: Arc<Settings>) -> Self {
        Self {
            registry,
            settings,
            current_zone_id: None,
            enter_at_ms: None,
            hover_emitted: false,
            last_sample_ms: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Process one cursor sample, returning the events it produced.
    pub fn sample(&mut self, x: i32, y: i32, timestamp_ms: u64) -> Vec<SpatialEvent> {
        let t = timestamp_ms.max(self.last_sample_ms);
        self.last_sample_ms = t;
        let mut events = Vec::new();

        // A zone removed from the registry mid-dwell exits immediately,
        // even if the cursor has not moved.
        if let Some(current) = self.current_zone_id.clone() {
            if !self.registry.contains(&current) {
                events.push(SpatialEvent::new(SpatialEventKind::Exit, &current, (x, y), t));
                self.clear_current();
            }
        }

        // Smallest-area zone wins; the registry breaks further ties by
        // confidence then recency.
        let hit = self.registry.find_at_point(x, y).map(|z| z.id);

        if hit != self.current_zone_id {
            if let Some(old) = self.current_zone_id.take() {
                events.push(SpatialEvent::new(SpatialEventKind::Exit, &old, (x, y), t));
            }
            if let Some(new) = &hit {
                events.push(SpatialEvent::new(SpatialEventKind::Enter, new, (x, y), t));
                self.enter_at_ms = Some(t);
                self.hover_emitted = false;
            } else {
                self.enter_at_ms = None;
            }
            self.current_zone_id = hit;
        } else if let (Some(zone_id), Some(entered)) = (&self.current_zone_id, self.enter_at_ms) {
            let dwell = t.saturating_sub(entered);
            if !self.hover_emitted && dwell >= self.settings.hover_threshold_ms {
                events.push(SpatialEvent::hover(zone_id, (x, y), t, dwell));
                self.hover_emitted = true;
            }
        }

        for event in &events {
            if self.history.len() == HISTORY_CAPACITY {
                self.history.pop_front();
            }
            self.history.push_back(event.clone());
        }
        events
    }

    /// Id of the zone the cursor currently occupies.
    pub fn current_zone(&self) -> Option<String> {
        self.current_zone_id.clone()
    }

    pub fn is_in_zone(&self, zone_id: &str) -> bool {
        self.current_zone_id.as_deref() == Some(zone_id)
    }

    /// Recent events, oldest first.
    pub fn history(&self, limit: usize) -> Vec<SpatialEvent> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn reset(&mut self) {
        self.clear_current();
        self.history.clear();
        self.last_sample_ms = 0;
    }

    fn clear_current(&mut self) {
        self.current_zone_id = None;
        self.enter_at_ms = None;
        self.hover_emitted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rect, Zone, ZoneKind, ZoneState};

    fn zone(id: &str, bounds: Rect) -> Zone {
        Zone {
            id: id.to_string(),
            label: id.to_string(),
            kind: ZoneKind::Button,
            state: ZoneState::Enabled,
            bounds,
            confidence: 1.0,
            parent_id: None,
            last_seen: 0,
        }
    }

    fn setup() -> (Arc<ZoneRegistry>, ZoneTracker) {
        let registry = Arc::new(ZoneRegistry::new());
        let tracker = ZoneTracker::new(registry.clone(), Arc::new(Settings::default()));
        (registry, tracker)
    }

    #[test]
    fn enter_then_exit() {
        let (registry, mut tracker) = setup();
        registry.register(zone("a", Rect::new(0, 0, 100, 100)));

        let events = tracker.sample(50, 50, 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SpatialEventKind::Enter);
        assert_eq!(events[0].zone_id, "a");

        let events = tracker.sample(500, 500, 20);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SpatialEventKind::Exit);
        assert!(tracker.current_zone().is_none());
    }

    #[test]
    fn hover_fires_once_per_dwell() {
        let (registry, mut tracker) = setup();
        registry.register(zone("a", Rect::new(0, 0, 100, 100)));

        tracker.sample(50, 50, 0);
        assert!(tracker.sample(51, 50, 100).is_empty());
        let events = tracker.sample(52, 50, 600);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SpatialEventKind::Hover);
        assert_eq!(events[0].dwell_ms, Some(600));
        // No second hover for the same dwell.
        assert!(tracker.sample(53, 50, 1_200).is_empty());
    }

    #[test]
    fn vanished_zone_exits_immediately() {
        let (registry, mut tracker) = setup();
        registry.register(zone("a", Rect::new(0, 0, 100, 100)));
        tracker.sample(50, 50, 0);
        registry.replace_all(Vec::new());

        let events = tracker.sample(50, 50, 10);
        assert_eq!(events[0].kind, SpatialEventKind::Exit);
        assert!(tracker.current_zone().is_none());
    }

    #[test]
    fn overlapping_zones_pick_smallest() {
        let (registry, mut tracker) = setup();
        registry.register(zone("big", Rect::new(0, 0, 200, 200)));
        registry.register(zone("small", Rect::new(40, 40, 20, 20)));
        tracker.sample(50, 50, 0);
        assert_eq!(tracker.current_zone().as_deref(), Some("small"));
    }

    #[test]
    fn event_timestamps_never_go_backwards() {
        let (registry, mut tracker) = setup();
        registry.register(zone("a", Rect::new(0, 0, 100, 100)));
        tracker.sample(50, 50, 100);
        let events = tracker.sample(500, 500, 40);
        assert_eq!(events[0].timestamp_ms, 100);
    }

    #[test]
    fn switching_zones_emits_exit_then_enter() {
        let (registry, mut tracker) = setup();
        registry.register(zone("a", Rect::new(0, 0, 50, 50)));
        registry.register(zone("b", Rect::new(100, 0, 50, 50)));
        tracker.sample(25, 25, 0);
        let events = tracker.sample(125, 25, 10);
        let kinds: Vec<SpatialEventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![SpatialEventKind::Exit, SpatialEventKind::Enter]);
    }
}
