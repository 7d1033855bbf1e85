use serde::{Deserialize, Serialize};

/// Spatial events emitted while the cursor moves over the zone map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialEventKind {
    Enter,
    Exit,
    Hover,
    Click,
    Type,
    BrushLost,
}

/// Something that happened at a screen position and time.
///
/// Produced by the zone tracker and the action executor; consumed by
/// the session recorder. The core never persists them itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEvent {
    pub kind: SpatialEventKind,
    /// Zone involved; empty for `BrushLost` where no zone applies.
    pub zone_id: String,
    pub position: (i32, i32),
    pub timestamp_ms: u64,
    /// Dwell duration, present on `Hover` only.
    #[serde(default)]
    pub dwell_ms: Option<u64>,
}

impl SpatialEvent {
    pub fn new(kind: SpatialEventKind, zone_id: &str, position: (i32, i32), t: u64) -> Self {
        Self {
            kind,
            zone_id: zone_id.to_string(),
            position,
            timestamp_ms: t,
            dwell_ms: None,
        }
    }

    pub fn hover(zone_id: &str, position: (i32, i32), t: u64, dwell_ms: u64) -> Self {
        Self {
            kind: SpatialEventKind::Hover,
            zone_id: zone_id.to_string(),
            position,
            timestamp_ms: t,
            dwell_ms: Some(dwell_ms),
        }
    }
}
