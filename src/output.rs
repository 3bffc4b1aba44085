//! Result types produced by the identification pipeline.
//!
//! Absence is never represented by `Option` or an empty string here: a plate
//! that was not read, or a classifier that is switched off, is reported with
//! one of the sentinel constants below. Callers can render any field without
//! null checks.

use crate::error::StageError;
use serde::{Deserialize, Serialize};

/// Plate text reported when no candidate passes validation.
pub const NOT_DETECTED: &str = "not detected";

/// Brand/type reported when the classifier failed or had no type.
pub const UNKNOWN: &str = "unknown";

/// Brand/type reported when no classifier is configured.
pub const NOT_IMPLEMENTED: &str = "not implemented";

/// The validated plate, or the "not detected" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateResult {
    pub text: String,
    pub found: bool,
}

impl PlateResult {
    /// A plate that passed validation.
    ///
    /// Empty text cannot be "found"; it collapses to [`PlateResult::not_detected`].
    pub fn detected(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::not_detected();
        }
        Self { text, found: true }
    }

    /// No plate passed validation.
    pub fn not_detected() -> Self {
        Self {
            text: NOT_DETECTED.to_string(),
            found: false,
        }
    }
}

/// Brand and body type of the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleLabel {
    pub brand: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl VehicleLabel {
    pub fn new(brand: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            kind: kind.into(),
        }
    }

    /// Returned when classification ran but failed.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    /// Returned in degraded mode, when no classifier is configured.
    pub fn not_implemented() -> Self {
        Self::new(NOT_IMPLEMENTED, NOT_IMPLEMENTED)
    }
}

/// Terminal output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub plate: PlateResult,
    pub vehicle: VehicleLabel,
}

/// Timing and bookkeeping for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyStats {
    /// Time spent downloading and decoding the image.
    pub fetch_ms: u64,
    /// Time spent in OCR, excluding plate validation.
    pub recognize_ms: u64,
    /// Time spent classifying (0 in degraded mode).
    pub classify_ms: u64,
    /// Wall-clock time for the whole run.
    pub total_ms: u64,
    /// Number of OCR candidates considered by the validator.
    pub candidates: usize,
    pub image_width: u32,
    pub image_height: u32,
}

/// Everything one run produced: the result, its stats, and any branch that
/// fell back to sentinels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyReport {
    pub result: IdentificationResult,
    pub stats: IdentifyStats,
    /// Non-fatal failures. Empty on a fully healthy run.
    pub degraded: Vec<StageError>,
}

impl IdentifyReport {
    /// `true` when at least one branch fell back to sentinel output.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
