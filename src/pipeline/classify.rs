//! Vehicle brand/type classification.
//!
//! Classification is best-effort: the plate is what callers need, brand and
//! type are extra context. So this stage never fails a request. It has two
//! documented modes:
//!
//! - **Disabled** ([`DisabledClassifier`], the default): returns
//!   `("not implemented", "not implemented")` immediately without touching a
//!   model. Callers can tell "we did not try" apart from "we tried and could
//!   not tell".
//! - **Vision** ([`VisionClassifier`]): asks a vision-language model for
//!   ranked `"<Brand> <type>"` labels and splits the best one. Any failure
//!   becomes `("unknown", "unknown")`.

use crate::error::StageError;
use crate::models::ModelHandle;
use crate::output::{VehicleLabel, UNKNOWN};
use crate::pipeline::acquire::SourceImage;
use crate::pipeline::encode::encode_image;
use crate::pipeline::llm::{ask_vision_model, VisionSettings};
use crate::pipeline::postprocess::extract_json_array;
use crate::prompts::{classify_instruction, CLASSIFY_SYSTEM_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Brand/type classification capability.
#[async_trait]
pub trait VehicleClassifier: Send + Sync {
    async fn classify(&self, image: &SourceImage) -> Result<VehicleLabel, StageError>;

    /// `false` for placeholder implementations that never inspect the image.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Degraded mode: no classification capability is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl VehicleClassifier for DisabledClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<VehicleLabel, StageError> {
        Ok(VehicleLabel::not_implemented())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// One ranked guess from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// [`VehicleClassifier`] backed by a vision-language model.
#[derive(Debug, Clone)]
pub struct VisionClassifier {
    model: ModelHandle,
    labels: Vec<String>,
    settings: VisionSettings,
}

impl VisionClassifier {
    /// `labels` optionally restricts answers to a fixed vocabulary; an empty
    /// list means any `"<Brand> <type>"` label is accepted.
    pub fn new(model: ModelHandle, labels: Vec<String>, settings: VisionSettings) -> Self {
        Self {
            model,
            labels,
            settings,
        }
    }
}

#[async_trait]
impl VehicleClassifier for VisionClassifier {
    async fn classify(&self, image: &SourceImage) -> Result<VehicleLabel, StageError> {
        let provider = self
            .model
            .provider()
            .await
            .map_err(|e| classification_error(e.to_string()))?;

        let image_data = encode_image(&image.raster, self.settings.max_image_dimension)
            .map_err(|e| classification_error(format!("image encoding failed: {e}")))?;

        let reply = ask_vision_model(
            &provider,
            CLASSIFY_SYSTEM_PROMPT,
            &classify_instruction(&self.labels),
            image_data,
            &self.settings,
        )
        .await
        .map_err(classification_error)?;

        let ranked = parse_labels(&reply.content).map_err(classification_error)?;
        let Some(best) = top_label(&ranked, &self.labels) else {
            debug!("Classifier returned no usable label");
            return Ok(VehicleLabel::unknown());
        };

        debug!("Classified as '{}' ({:.2})", best.label, best.score);
        let (brand, kind) = split_label(&best.label);
        Ok(VehicleLabel::new(brand, kind))
    }
}

fn classification_error(detail: impl Into<String>) -> StageError {
    StageError::Classification {
        detail: detail.into(),
    }
}

/// Run `classifier`, converting any failure into the unknown label.
///
/// The second element carries the failure so the caller can record it.
pub async fn classify_or_degrade(
    classifier: &dyn VehicleClassifier,
    image: &SourceImage,
) -> (VehicleLabel, Option<StageError>) {
    match classifier.classify(image).await {
        Ok(label) => (label, None),
        Err(e) => {
            warn!("{}", e);
            (VehicleLabel::unknown(), Some(e))
        }
    }
}

/// Split `"<Brand> <type>"` on the first space.
///
/// A label without a space is all brand and the type is `"unknown"`. A blank
/// label is `("unknown", "unknown")`.
///
/// ```
/// use edgequake_vehicle_id::pipeline::classify::split_label;
///
/// assert_eq!(split_label("Toyota sedan"), ("Toyota".into(), "sedan".into()));
/// assert_eq!(split_label("Land Rover"), ("Land".into(), "Rover".into()));
/// assert_eq!(split_label("Tesla"), ("Tesla".into(), "unknown".into()));
/// ```
pub fn split_label(label: &str) -> (String, String) {
    let label = label.trim();
    if label.is_empty() {
        return (UNKNOWN.to_string(), UNKNOWN.to_string());
    }
    match label.split_once(' ') {
        Some((brand, kind)) if !kind.trim().is_empty() => {
            (brand.to_string(), kind.trim().to_string())
        }
        Some((brand, _)) => (brand.to_string(), UNKNOWN.to_string()),
        None => (label.to_string(), UNKNOWN.to_string()),
    }
}

/// Parse a classifier reply of the form `[{"label": "...", "score": 0.8}, ...]`.
pub fn parse_labels(reply: &str) -> Result<Vec<LabelScore>, String> {
    let json = extract_json_array(reply)
        .ok_or_else(|| "classifier reply contains no JSON array".to_string())?;
    let ranked: Vec<LabelScore> =
        serde_json::from_str(&json).map_err(|e| format!("malformed classifier reply: {e}"))?;
    Ok(ranked)
}

/// Highest-scoring label, first on ties. Non-finite scores and blank labels
/// are skipped; with a vocabulary, labels outside it are skipped too.
fn top_label<'a>(ranked: &'a [LabelScore], vocabulary: &[String]) -> Option<&'a LabelScore> {
    let mut best: Option<&LabelScore> = None;
    for candidate in ranked {
        if !candidate.score.is_finite() || candidate.label.trim().is_empty() {
            continue;
        }
        if !vocabulary.is_empty()
            && !vocabulary
                .iter()
                .any(|v| v.trim().eq_ignore_ascii_case(candidate.label.trim()))
        {
            continue;
        }
        if best.is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ls(label: &str, score: f32) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn split_on_first_space() {
        assert_eq!(
            split_label("Ford pickup truck"),
            ("Ford".to_string(), "pickup truck".to_string())
        );
        assert_eq!(
            split_label("  Seat hatchback "),
            ("Seat".to_string(), "hatchback".to_string())
        );
    }

    #[test]
    fn split_without_separator() {
        assert_eq!(
            split_label("Renault"),
            ("Renault".to_string(), "unknown".to_string())
        );
        assert_eq!(
            split_label(""),
            ("unknown".to_string(), "unknown".to_string())
        );
    }

    #[test]
    fn parse_and_rank() {
        let ranked = parse_labels(
            r#"```json
[{"label":"Seat hatchback","score":0.3},{"label":"Toyota sedan","score":0.6},{"label":"Kia sedan","score":0.6}]
```"#,
        )
        .unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(top_label(&ranked, &[]).unwrap().label, "Toyota sedan");
    }

    #[test]
    fn vocabulary_restricts_choice() {
        let ranked = vec![ls("Toyota sedan", 0.9), ls("Seat hatchback", 0.2)];
        let vocab = vec!["seat hatchback".to_string()];
        assert_eq!(top_label(&ranked, &vocab).unwrap().label, "Seat hatchback");
        let none = vec!["Ford van".to_string()];
        assert!(top_label(&ranked, &none).is_none());
    }

    #[test]
    fn skips_non_finite_scores() {
        let ranked = vec![ls("Bad label", f32::NAN), ls("Opel van", 0.1)];
        assert_eq!(top_label(&ranked, &[]).unwrap().label, "Opel van");
        assert!(top_label(&[], &[]).is_none());
    }

    #[test]
    fn unparseable_reply_is_an_error() {
        assert!(parse_labels("no idea").is_err());
        assert!(parse_labels(r#"[{"label": 3}]"#).is_err());
    }

    #[test]
    fn disabled_returns_not_implemented() {
        let image = SourceImage {
            raster: image::DynamicImage::new_rgb8(2, 2),
            format: image::ImageFormat::Png,
            content_type: "image/png".to_string(),
            size_bytes: 0,
        };
        let (label, err) = tokio_test::block_on(classify_or_degrade(&DisabledClassifier, &image));
        assert_eq!(label, VehicleLabel::not_implemented());
        assert!(err.is_none());
        assert!(!DisabledClassifier.is_enabled());
    }

    struct Broken;

    #[async_trait]
    impl VehicleClassifier for Broken {
        async fn classify(&self, _image: &SourceImage) -> Result<VehicleLabel, StageError> {
            Err(classification_error("model offline"))
        }
    }

    #[tokio::test]
    async fn failure_degrades_to_unknown() {
        let image = SourceImage {
            raster: image::DynamicImage::new_rgb8(2, 2),
            format: image::ImageFormat::Png,
            content_type: "image/png".to_string(),
            size_bytes: 0,
        };
        let (label, err) = classify_or_degrade(&Broken, &image).await;
        assert_eq!(label, VehicleLabel::unknown());
        assert!(matches!(err, Some(StageError::Classification { .. })));
    }
}
