//! Plate recognition: find text regions in a raster and read them.
//!
//! The recognizer reports everything it can read (plates, stickers, dealer
//! badges) with a confidence per region. Deciding which region is the plate
//! is the validator's job, so nothing is filtered here except readings that
//! carry no usable text or confidence.

use crate::error::StageError;
use crate::models::ModelHandle;
use crate::pipeline::acquire::SourceImage;
use crate::pipeline::encode::encode_image;
use crate::pipeline::llm::{ask_vision_model, VisionSettings};
use crate::pipeline::postprocess::extract_json_array;
use crate::prompts::{ocr_instruction, OCR_SYSTEM_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Axis-aligned region of the source image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One text reading produced by a [`TextRecognizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrCandidate {
    pub text: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub region: Option<BoundingRegion>,
}

impl OcrCandidate {
    /// A candidate without a region. Confidence is clamped to `[0, 1]`.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            region: None,
        }
    }

    pub fn with_region(mut self, region: BoundingRegion) -> Self {
        self.region = Some(region);
        self
    }
}

/// OCR capability over a decoded image.
///
/// An image without text yields `Ok(vec![])`. `Err` is reserved for the
/// capability itself failing; the orchestrator degrades on it.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError>;
}

/// [`TextRecognizer`] backed by a vision-language model.
#[derive(Debug, Clone)]
pub struct VisionRecognizer {
    model: ModelHandle,
    languages: Vec<String>,
    settings: VisionSettings,
}

impl VisionRecognizer {
    pub fn new(model: ModelHandle, languages: Vec<String>, settings: VisionSettings) -> Self {
        Self {
            model,
            languages,
            settings,
        }
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError> {
        let provider = self
            .model
            .provider()
            .await
            .map_err(|e| recognition_error(e.to_string()))?;

        let image_data = encode_image(&image.raster, self.settings.max_image_dimension)
            .map_err(|e| recognition_error(format!("image encoding failed: {e}")))?;

        let reply = ask_vision_model(
            &provider,
            OCR_SYSTEM_PROMPT,
            &ocr_instruction(&self.languages),
            image_data,
            &self.settings,
        )
        .await
        .map_err(recognition_error)?;

        let candidates = parse_candidates(&reply.content).map_err(recognition_error)?;
        debug!(
            "OCR read {} region(s) in {}ms",
            candidates.len(),
            reply.duration_ms
        );
        Ok(candidates)
    }
}

fn recognition_error(detail: impl Into<String>) -> StageError {
    StageError::Recognition {
        detail: detail.into(),
    }
}

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, rename = "box")]
    bbox: Option<Vec<f64>>,
}

/// Parse an OCR reply of the form
/// `[{"text": "...", "confidence": 0.9, "box": [x, y, w, h]}, ...]`.
///
/// The reply may be fenced or surrounded by prose. Readings with blank text
/// or a non-finite confidence are dropped; a missing confidence counts as 0.
/// A malformed `box` is ignored rather than rejecting the reading.
pub fn parse_candidates(reply: &str) -> Result<Vec<OcrCandidate>, String> {
    let json = extract_json_array(reply)
        .ok_or_else(|| format!("OCR reply contains no JSON array: {}", preview(reply)))?;
    let readings: Vec<RawReading> =
        serde_json::from_str(&json).map_err(|e| format!("malformed OCR reply: {e}"))?;

    Ok(readings
        .into_iter()
        .filter_map(|r| {
            let confidence = r.confidence.unwrap_or(0.0);
            if !confidence.is_finite() || r.text.trim().is_empty() {
                return None;
            }
            let candidate = OcrCandidate::new(r.text, confidence as f32);
            Some(match r.bbox.as_deref().and_then(region_from_box) {
                Some(region) => candidate.with_region(region),
                None => candidate,
            })
        })
        .collect())
}

fn region_from_box(b: &[f64]) -> Option<BoundingRegion> {
    match *b {
        [x, y, w, h] if [x, y, w, h].iter().all(|v| v.is_finite() && *v >= 0.0) => {
            Some(BoundingRegion {
                x: x as f32,
                y: y as f32,
                width: w as f32,
                height: h as f32,
            })
        }
        _ => None,
    }
}

fn preview(s: &str) -> String {
    let s = s.trim();
    match s.char_indices().nth(80) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
