//! Pipeline stages for vehicle identification.
//!
//! Each submodule implements exactly one step and is independently testable.
//! The capability seams ([`acquire::ImageFetcher`],
//! [`recognize::TextRecognizer`], [`classify::VehicleClassifier`],
//! [`validate::PlateGrammar`]) are traits so backends can be swapped without
//! touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! acquire ──▶ recognize ──▶ validate
//!  (URL)   │   (OCR VLM)    (grammar + confidence)
//!          └─▶ classify
//!              (brand/type VLM, or disabled)
//! ```
//!
//! 1. [`acquire`]   — download with a timeout, check the content type, decode
//! 2. [`recognize`] — read every text region with a confidence
//! 3. [`validate`]  — normalise, filter, and pick the best plate
//! 4. [`classify`]  — best-effort `(brand, type)`; never fails the request
//!
//! Supporting modules used by the model-backed stages:
//!
//! - [`encode`]      — PNG-encode and base64-wrap the raster for the API body
//! - [`llm`]         — the single vision-model call shared by both backends
//! - [`postprocess`] — repair fenced or chatty model replies before parsing

pub mod acquire;
pub mod classify;
pub mod encode;
pub mod llm;
pub mod postprocess;
pub mod recognize;
pub mod validate;
