use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::capture::Frame;
use crate::clock::Clock;
use crate::config::Settings;
use crate::llm::{
    extract_json_payload, extract_text_content, extract_token_count, LlmTransport, MODEL,
};
use crate::models::{Rect, Zone, ZoneKind, ZoneState};

const MAX_TOKENS: u32 = 4_096;

const SYSTEM_PROMPT: &str = "You are a UI analysis engine. You receive a screenshot of a \
computer screen and must identify every interactive or visually distinct element. Return \
ONLY a JSON array (no markdown, no commentary). Each element is an object with:\n\
  \"id\"        : string — stable identifier, e.g. \"zone_save_btn\"\n\
  \"label\"     : string — visible text or short description\n\
  \"kind\"      : string — one of: button, text_field, menu_item, icon, checkbox, link, \
scroll_area, other\n\
  \"state\"     : string — one of: enabled, disabled, focused, hovered, pressed, checked, \
unchecked\n\
  \"bounds\"    : object — {x, y, w, h} in pixels, origin top-left\n\
  \"confidence\": number in [0, 1]\n\
  \"parent_id\" : string or null — id of the enclosing container zone\n\
Coordinates must be absolute screen pixels. Include menus, toolbars, and content panes. \
Return [] if the screen is blank or unreadable.";

/// Request for a full-screen zone inventory.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image_png: Vec<u8>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub context_hint: String,
}

/// Outcome of one vision analysis call.
///
/// `success && zones.is_empty()` is a parse-success failure, distinct
/// from transport failure: the call worked but the model saw nothing.
/// Callers apply the zone-preservation rule in that case.
#[derive(Debug, Clone, Default)]
pub struct VisionOutcome {
    pub zones: Vec<Zone>,
    pub raw_response: String,
    pub latency_ms: u64,
    pub token_count: u32,
    pub success: bool,
    pub error: String,
}

impl VisionOutcome {
    pub fn is_parse_success_empty(&self) -> bool {
        self.success && self.zones.is_empty()
    }
}

#[derive(Deserialize)]
struct WireZone {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    state: Option<String>,
    bounds: Rect,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default, alias = "parent")]
    parent_id: Option<String>,
}

/// Top-tier analyzer: ships a frame to the remote vision LLM and
/// parses the structured zone inventory out of the reply.
pub struct VisionAnalyzer {
    transport: Arc<dyn LlmTransport>,
    settings: Arc<Settings>,
    clock: Clock,
}

impl VisionAnalyzer {
    pub fn new(transport: Arc<dyn LlmTransport>, settings: Arc<Settings>, clock: Clock) -> Self {
        Self {
            transport,
            settings,
            clock,
        }
    }

    /// Losslessly encode a frame for the wire.
    pub fn encode_frame(frame: &Frame) -> anyhow::Result<Vec<u8>> {
        let mut png: Vec<u8> = Vec::new();
        let dynamic = image::DynamicImage::ImageRgba8(frame.image.clone());
        dynamic.write_to(&mut png, image::ImageOutputFormat::Png)?;
        Ok(png)
    }

    pub fn request_for(frame: &Frame, context_hint: &str) -> anyhow::Result<VisionRequest> {
        Ok(VisionRequest {
            image_png: Self::encode_frame(frame)?,
            screen_width: frame.width(),
            screen_height: frame.height(),
            context_hint: context_hint.to_string(),
        })
    }

    /// One synchronous analysis pass with retry and exponential
    /// backoff on transient failures.
    pub async fn analyze(&self, request: &VisionRequest) -> VisionOutcome {
        let payload = self.build_payload(request);
        let timeout = Duration::from_secs_f32(self.settings.api_timeout_vision_seconds);
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 0..self.settings.api_max_retries {
            match self.transport.send(payload.clone(), timeout).await {
                Ok(body) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let raw = extract_text_content(&body).unwrap_or_default();
                    match self.parse_zones(&raw, request) {
                        Some(zones) => {
                            info!(
                                zones = zones.len(),
                                latency_ms, "vision analysis complete"
                            );
                            return VisionOutcome {
                                zones,
                                raw_response: raw,
                                latency_ms,
                                token_count: extract_token_count(&body),
                                success: true,
                                error: String::new(),
                            };
                        }
                        None => {
                            // Unparseable reply counts as transient.
                            last_error = "vision response was not a zone array".to_string();
                            warn!(attempt, "vision response parse failed");
                        }
                    }
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(attempt, %err, "vision call failed");
                    if !err.is_transient() {
                        break;
                    }
                }
            }

            if attempt + 1 < self.settings.api_max_retries {
                let delay = self.settings.api_backoff_base_seconds * 2f32.powi(attempt as i32);
                tokio::time::sleep(Duration::from_secs_f32(delay)).await;
            }
        }

        VisionOutcome {
            latency_ms: started.elapsed().as_millis() as u64,
            success: false,
            error: last_error,
            ..Default::default()
        }
    }

    fn build_payload(&self, request: &VisionRequest) -> Value {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&request.image_png);
        let mut user_text = format!(
            "Screen dimensions: {}x{} pixels.\nIdentify every interactive and visually \
             distinct UI element. Return the JSON array described in the system prompt.",
            request.screen_width, request.screen_height
        );
        if !request.context_hint.is_empty() {
            user_text.push_str("\n\nContext: ");
            user_text.push_str(&request.context_hint);
        }

        json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": b64,
                        },
                    },
                    { "type": "text", "text": user_text },
                ],
            }],
        })
    }

    // None means the reply held no JSON array at all; an empty vec is a
    // valid parse of `[]`.
    fn parse_zones(&self, raw: &str, request: &VisionRequest) -> Option<Vec<Zone>> {
        let payload = extract_json_payload(raw)?;
        let value: Value = serde_json::from_str(&payload).ok()?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("zones") {
                Some(Value::Array(items)) => items,
                _ => return None,
            },
            _ => return None,
        };

        let now = self.clock.now_ms();
        let screen = Rect::new(0, 0, request.screen_width, request.screen_height);
        let mut zones = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let wire: WireZone = match serde_json::from_value(item) {
                Ok(w) => w,
                Err(err) => {
                    warn!(index, %err, "skipping malformed zone record");
                    continue;
                }
            };
            let bounds = wire.bounds;
            // Screen-boundary invariant: degenerate or off-screen
            // bounds never enter the registry.
            if bounds.area() == 0 || !screen.overlaps(&bounds) {
                warn!(index, ?bounds, "skipping out-of-bounds zone record");
                continue;
            }
            zones.push(Zone {
                id: wire.id.unwrap_or_else(|| format!("zone_{index}")),
                label: wire.label,
                kind: wire.kind.as_deref().map(ZoneKind::parse).unwrap_or(ZoneKind::Other),
                state: wire
                    .state
                    .as_deref()
                    .map(ZoneState::parse)
                    .unwrap_or_default(),
                bounds,
                confidence: wire.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
                parent_id: wire.parent_id,
                last_seen: now,
            });
        }
        Some(zones)
    }
}
