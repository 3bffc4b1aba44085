//! # edgequake-vehicle-id
//!
//! Identify a vehicle from a single photograph: read its license plate and,
//! optionally, its brand and body type.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image URL
//!  │
//!  ├─ 1. Acquire   download (timed), check content type, decode
//!  ├─ 2. Recognize OCR every text region via a vision model      ┐ concurrent
//!  ├─ 3. Classify  brand/type via a vision model, or disabled    ┘
//!  ├─ 4. Validate  normalise, plate grammar, confidence gate, best wins
//!  └─ 5. Output    { plate, vehicle } with explicit sentinels
//! ```
//!
//! Every field of the result is always populated. Absence is spelled out:
//! `"not detected"` for the plate, `"unknown"` when the classifier could not
//! tell, `"not implemented"` when classification is disabled.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_vehicle_id::{identify, IdentifyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = IdentifyConfig::default();
//!     let result = identify("https://example.com/car.jpg", &config).await?;
//!     println!("{} ({} {})", result.plate.text, result.vehicle.brand, result.vehicle.kind);
//!     Ok(())
//! }
//! ```
//!
//! ## Serving
//!
//! [`api::router`] exposes the pipeline as `POST /detect_vehicle` (also
//! mounted at `/`), answering
//! `{ "status": "success", "data": { "placa", "marca", "tipo" } }`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vehicle-id` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod identify;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClassifierMode, IdentifyConfig, IdentifyConfigBuilder};
pub use error::{ErrorKind, IdentifyError, StageError};
pub use identify::{identify, identify_sync, Identifier};
pub use output::{
    IdentificationResult, IdentifyReport, IdentifyStats, PlateResult, VehicleLabel,
    NOT_DETECTED, NOT_IMPLEMENTED, UNKNOWN,
};
pub use pipeline::acquire::{FetchedImage, HttpFetcher, ImageFetcher, SourceImage};
pub use pipeline::classify::{split_label, DisabledClassifier, VehicleClassifier, VisionClassifier};
pub use pipeline::recognize::{BoundingRegion, OcrCandidate, TextRecognizer, VisionRecognizer};
pub use pipeline::validate::{PlateGrammar, PlateValidator, RegexGrammar};
pub use progress::{IdentifyProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
