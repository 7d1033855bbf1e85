use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{Zone, ZoneKind};

/// Authoritative store of all zones currently known on screen.
///
/// All mutation serializes on one internal lock; readers take the same
/// lock briefly and return cloned data, so no reference into the store
/// ever escapes. `replace_all` is the only operation that may shrink
/// the set non-monotonically in a single step, and it is all-or-nothing:
/// an observer after the swap sees exactly the new set.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Mutex<HashMap<String, Zone>>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh one zone. An existing id has its fields
    /// overwritten; `last_seen` never moves backwards for an id.
    pub fn register(&self, mut zone: Zone) {
        let mut zones = self.zones.lock().unwrap();
        if let Some(existing) = zones.get(&zone.id) {
            zone.last_seen = zone.last_seen.max(existing.last_seen);
        }
        zones.insert(zone.id.clone(), zone);
    }

    pub fn register_many(&self, incoming: Vec<Zone>) {
        let mut zones = self.zones.lock().unwrap();
        for mut zone in incoming {
            if let Some(existing) = zones.get(&zone.id) {
                zone.last_seen = zone.last_seen.max(existing.last_seen);
            }
            zones.insert(zone.id.clone(), zone);
        }
    }

    /// Atomically swap the entire set. Ids absent from `incoming` are
    /// removed.
    pub fn replace_all(&self, incoming: Vec<Zone>) {
        let mut zones = self.zones.lock().unwrap();
        zones.clear();
        for zone in incoming {
            zones.insert(zone.id.clone(), zone);
        }
    }

    pub fn remove(&self, id: &str) -> Option<Zone> {
        self.zones.lock().unwrap().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Zone> {
        self.zones.lock().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.zones.lock().unwrap().contains_key(id)
    }

    pub fn all(&self) -> Vec<Zone> {
        self.zones.lock().unwrap().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.zones.lock().unwrap().len()
    }

    /// Case-insensitive substring match over labels.
    pub fn find_by_label(&self, needle: &str) -> Vec<Zone> {
        let needle = needle.to_lowercase();
        self.zones
            .lock()
            .unwrap()
            .values()
            .filter(|z| z.label.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn find_by_kind(&self, kind: ZoneKind) -> Vec<Zone> {
        self.zones
            .lock()
            .unwrap()
            .values()
            .filter(|z| z.kind == kind)
            .cloned()
            .collect()
    }

    pub fn find_by_parent(&self, parent_id: &str) -> Vec<Zone> {
        self.zones
            .lock()
            .unwrap()
            .values()
            .filter(|z| z.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect()
    }

    /// The smallest zone containing the point. Ties break to highest
    /// confidence, then most recent `last_seen`.
    pub fn find_at_point(&self, x: i32, y: i32) -> Option<Zone> {
        let zones = self.zones.lock().unwrap();
        let mut hits: Vec<&Zone> = zones.values().filter(|z| z.contains_point(x, y)).collect();
        hits.sort_by(|a, b| {
            a.bounds
                .area()
                .cmp(&b.bounds.area())
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.last_seen.cmp(&a.last_seen))
        });
        hits.first().map(|z| (*z).clone())
    }

    /// All zones containing the point, smallest first with the same
    /// tie-break order as `find_at_point`.
    pub fn find_all_at_point(&self, x: i32, y: i32) -> Vec<Zone> {
        let zones = self.zones.lock().unwrap();
        let mut hits: Vec<Zone> = zones
            .values()
            .filter(|z| z.contains_point(x, y))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            a.bounds
                .area()
                .cmp(&b.bounds.area())
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.last_seen.cmp(&a.last_seen))
        });
        hits
    }

    /// Zone whose bounds edge is nearest to the point (euclidean).
    pub fn nearest_to(&self, x: i32, y: i32) -> Option<Zone> {
        let zones = self.zones.lock().unwrap();
        zones
            .values()
            .min_by(|a, b| {
                a.bounds
                    .distance_to_point(x, y)
                    .partial_cmp(&b.bounds.distance_to_point(x, y))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// Refresh a zone's `last_seen`, keeping it monotonic.
    pub fn update_last_seen(&self, id: &str, timestamp_ms: u64) {
        let mut zones = self.zones.lock().unwrap();
        if let Some(zone) = zones.get_mut(id) {
            zone.last_seen = zone.last_seen.max(timestamp_ms);
        }
    }

    /// Remove zones not seen within `max_age_ms`. Returns removed ids.
    pub fn expire_stale(&self, now_ms: u64, max_age_ms: u64) -> Vec<String> {
        let mut zones = self.zones.lock().unwrap();
        let stale: Vec<String> = zones
            .values()
            .filter(|z| now_ms.saturating_sub(z.last_seen) > max_age_ms)
            .map(|z| z.id.clone())
            .collect();
        for id in &stale {
            zones.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rect, ZoneState};

    fn zone(id: &str, bounds: Rect, confidence: f32, last_seen: u64) -> Zone {
        Zone {
            id: id.to_string(),
            label: id.to_string(),
            kind: ZoneKind::Button,
            state: ZoneState::Enabled,
            bounds,
            confidence,
            parent_id: None,
            last_seen,
        }
    }

    #[test]
    fn register_refreshes_and_keeps_last_seen_monotonic() {
        let reg = ZoneRegistry::new();
        reg.register(zone("a", Rect::new(0, 0, 10, 10), 0.9, 100));
        reg.register(zone("a", Rect::new(0, 0, 20, 20), 0.8, 50));
        let stored = reg.get("a").unwrap();
        assert_eq!(stored.bounds.width, 20);
        assert_eq!(stored.last_seen, 100);
    }

    #[test]
    fn replace_all_is_exact() {
        let reg = ZoneRegistry::new();
        reg.register(zone("old", Rect::new(0, 0, 10, 10), 1.0, 0));
        reg.replace_all(vec![
            zone("n1", Rect::new(0, 0, 10, 10), 1.0, 0),
            zone("n2", Rect::new(20, 0, 10, 10), 1.0, 0),
        ]);
        let mut ids: Vec<String> = reg.all().into_iter().map(|z| z.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["n1", "n2"]);
    }

    #[test]
    fn find_at_point_prefers_smallest_then_confidence() {
        let reg = ZoneRegistry::new();
        reg.register(zone("big", Rect::new(0, 0, 100, 100), 1.0, 0));
        reg.register(zone("small_lo", Rect::new(10, 10, 20, 20), 0.5, 5));
        reg.register(zone("small_hi", Rect::new(12, 12, 20, 20), 0.9, 1));
        let hit = reg.find_at_point(15, 15).unwrap();
        assert_eq!(hit.id, "small_hi");
    }

    #[test]
    fn expire_stale_returns_removed_ids() {
        let reg = ZoneRegistry::new();
        reg.register(zone("fresh", Rect::new(0, 0, 10, 10), 1.0, 900));
        reg.register(zone("stale", Rect::new(0, 0, 10, 10), 1.0, 100));
        let removed = reg.expire_stale(1_000, 500);
        assert_eq!(removed, vec!["stale".to_string()]);
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn nearest_to_measures_edge_distance() {
        let reg = ZoneRegistry::new();
        reg.register(zone("near", Rect::new(0, 0, 10, 10), 1.0, 0));
        reg.register(zone("far", Rect::new(100, 100, 10, 10), 1.0, 0));
        assert_eq!(reg.nearest_to(20, 5).unwrap().id, "near");
    }
}
