use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::capture::{CaptureLoop, Frame};
use crate::clock::Clock;
use crate::config::Settings;
use crate::registry::ZoneRegistry;

use super::classifier::{ChangeClassifier, FrameChange};
use super::region::RegionAnalyzer;
use super::vision::{VisionAnalyzer, VisionRequest};

/// Summary of one mapper pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperOutcome {
    pub change: FrameChange,
    pub zones_added: usize,
    pub zones_removed: usize,
    pub total_zones: usize,
    /// Vision failed or returned empty; prior zones were kept.
    pub degraded: bool,
    /// The frame was not analyzed (still transitioning).
    pub skipped: bool,
}

impl MapperOutcome {
    fn quiet(change: FrameChange, total_zones: usize) -> Self {
        Self {
            change,
            zones_added: 0,
            zones_removed: 0,
            total_zones,
            degraded: false,
            skipped: false,
        }
    }
}

/// Routes each captured frame through the tiering policy and owns all
/// registry writes on the perception side.
pub struct CanvasMapper {
    settings: Arc<Settings>,
    registry: Arc<ZoneRegistry>,
    classifier: Mutex<ChangeClassifier>,
    region: RegionAnalyzer,
    vision: VisionAnalyzer,
    capture: Arc<CaptureLoop>,
    clock: Clock,
}

impl CanvasMapper {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<ZoneRegistry>,
        vision: VisionAnalyzer,
        capture: Arc<CaptureLoop>,
        clock: Clock,
    ) -> Self {
        Self {
            classifier: Mutex::new(ChangeClassifier::new(settings.clone())),
            region: RegionAnalyzer::new(settings.clone()),
            settings,
            registry,
            vision,
            capture,
            clock,
        }
    }

    /// Process one frame against its predecessor.
    ///
    /// No registry write happens on Idle/CursorOnly/Transitioning. A
    /// failed or empty vision pass keeps the existing registry contents
    /// and reports `degraded` instead.
    pub async fn process_frame(&self, frame: &Frame, previous: Option<&Frame>) -> MapperOutcome {
        let outcome = match previous {
            // No baseline yet: the whole canvas is unknown.
            None => None,
            Some(prev) => Some(self.classifier.lock().unwrap().classify(prev, frame)),
        };
        let change = outcome.map_or(FrameChange::ContentChange, |o| o.change);

        match change {
            FrameChange::Idle | FrameChange::CursorOnly => {
                MapperOutcome::quiet(change, self.registry.count())
            }
            FrameChange::Transitioning => {
                debug!("screen still transitioning, deferring analysis");
                MapperOutcome {
                    skipped: true,
                    ..MapperOutcome::quiet(change, self.registry.count())
                }
            }
            FrameChange::MinorUpdate => {
                let bbox = outcome.and_then(|o| o.bbox).unwrap_or_else(|| {
                    crate::models::Rect::new(0, 0, frame.width(), frame.height())
                });
                let now = self.clock.now_ms();
                let zones = self.region.analyze(frame, bbox, now);
                let zones_added = zones.len();
                self.registry.register_many(zones);
                let zones_removed = self.expire_stale(now);
                info!(zones_added, zones_removed, "region pass applied");
                MapperOutcome {
                    change,
                    zones_added,
                    zones_removed,
                    total_zones: self.registry.count(),
                    degraded: false,
                    skipped: false,
                }
            }
            FrameChange::ContentChange => self.full_rebuild(frame, "screen content changed").await,
        }
    }

    /// Synchronous rebuild path used by the director at planned
    /// transition points: capture a fresh frame, run vision
    /// unconditionally, apply the preservation rule. Returns the
    /// post-call zone count.
    pub async fn recapture(&self) -> usize {
        let frame = match self.capture.capture_once() {
            Ok(frame) => frame,
            Err(err) => match self.capture.latest() {
                Some(frame) => {
                    warn!(%err, "recapture grab failed, reusing latest buffered frame");
                    frame
                }
                None => {
                    warn!(%err, "recapture failed with no buffered frame");
                    return self.registry.count();
                }
            },
        };
        self.classifier.lock().unwrap().reset();
        self.full_rebuild(&frame, "forced recapture").await;
        self.registry.count()
    }

    async fn full_rebuild(&self, frame: &Frame, context_hint: &str) -> MapperOutcome {
        let request = match VisionAnalyzer::request_for(frame, context_hint) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "frame encoding failed, keeping existing zones");
                return MapperOutcome {
                    degraded: true,
                    ..MapperOutcome::quiet(FrameChange::ContentChange, self.registry.count())
                };
            }
        };
        self.apply_vision(&request).await
    }

    async fn apply_vision(&self, request: &VisionRequest) -> MapperOutcome {
        let prior_count = self.registry.count();
        let outcome = self.vision.analyze(request).await;

        if outcome.success && !outcome.zones.is_empty() {
            let zones_added = outcome.zones.len();
            self.registry.replace_all(outcome.zones);
            info!(
                replaced = prior_count,
                zones_added,
                latency_ms = outcome.latency_ms,
                tokens = outcome.token_count,
                "canvas rebuilt from vision"
            );
            return MapperOutcome {
                change: FrameChange::ContentChange,
                zones_added,
                zones_removed: prior_count,
                total_zones: self.registry.count(),
                degraded: false,
                skipped: false,
            };
        }

        // Zone preservation: neither a transport failure nor a
        // parse-success-empty reply may empty the registry.
        if outcome.is_parse_success_empty() {
            warn!(
                prior_zones = prior_count,
                "vision returned no zones, keeping prior registry contents"
            );
        } else {
            warn!(
                prior_zones = prior_count,
                error = %outcome.error,
                "vision analysis failed, keeping prior registry contents"
            );
        }
        MapperOutcome {
            degraded: true,
            ..MapperOutcome::quiet(FrameChange::ContentChange, prior_count)
        }
    }

    fn expire_stale(&self, now_ms: u64) -> usize {
        let max_age_ms = (self.settings.zone_expiry_seconds * 1_000.0) as u64;
        let removed = self.registry.expire_stale(now_ms, max_age_ms);
        if !removed.is_empty() {
            debug!(count = removed.len(), "expired stale zones");
        }
        removed.len()
    }
}
