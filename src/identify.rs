//! Pipeline orchestration: URL in, identification out.
//!
//! ```text
//!               ┌─▶ recognize ─▶ validate ─┐
//! URL ─▶ acquire┤                          ├─▶ IdentificationResult
//!               └─▶ classify ──────────────┘
//! ```
//!
//! Acquisition failures abort the request. After that nothing is fatal
//! except a crashed plate worker: a recognizer error yields "not detected"
//! and a classifier error yields `("unknown", "unknown")`, each recorded in
//! [`IdentifyReport::degraded`].
//!
//! The two branches only read the decoded image, so they run as separate
//! tokio tasks over a shared `Arc<SourceImage>` and are joined before the
//! result is assembled. The tasks are aborted if the request future is
//! dropped first, so a disconnected client does not keep model calls alive.

use crate::config::{ClassifierMode, IdentifyConfig};
use crate::error::{IdentifyError, StageError};
use crate::models::{ModelHandle, ModelRole, ProviderSpec};
use crate::output::{IdentificationResult, IdentifyReport, IdentifyStats, VehicleLabel};
use crate::pipeline::acquire::{acquire, HttpFetcher, ImageFetcher};
use crate::pipeline::classify::{
    classify_or_degrade, DisabledClassifier, VehicleClassifier, VisionClassifier,
};
use crate::pipeline::recognize::{TextRecognizer, VisionRecognizer};
use crate::pipeline::validate::PlateValidator;
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

/// A configured pipeline, shareable across concurrent requests.
///
/// Cloning is cheap: every collaborator sits behind an `Arc`.
///
/// # Example
/// ```rust,no_run
/// use edgequake_vehicle_id::{Identifier, IdentifyConfig};
///
/// # async fn run() -> Result<(), edgequake_vehicle_id::IdentifyError> {
/// let identifier = Identifier::new(&IdentifyConfig::default())?;
/// let result = identifier.identify("https://example.com/car.jpg").await?;
/// println!("plate: {}", result.plate.text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Identifier {
    fetcher: Arc<dyn ImageFetcher>,
    recognizer: Arc<dyn TextRecognizer>,
    classifier: Arc<dyn VehicleClassifier>,
    validator: PlateValidator,
    max_image_bytes: usize,
    progress: ProgressCallback,
}

impl Identifier {
    /// Wire the default collaborators described by `config`.
    ///
    /// No model is contacted here; providers are created on first use.
    pub fn new(config: &IdentifyConfig) -> Result<Self, IdentifyError> {
        let settings = config.vision_settings();

        let ocr_spec = ProviderSpec {
            provider: config.provider.clone(),
            provider_name: config.provider_name.clone(),
            model: config.model.clone(),
        };

        let classifier: Arc<dyn VehicleClassifier> = match config.classifier {
            ClassifierMode::Disabled => Arc::new(DisabledClassifier),
            ClassifierMode::Vision {
                ref provider_name,
                ref model,
            } => {
                let spec = if provider_name.is_none() && model.is_none() {
                    ocr_spec.clone()
                } else {
                    ProviderSpec {
                        provider: None,
                        provider_name: provider_name.clone(),
                        model: model.clone(),
                    }
                };
                Arc::new(VisionClassifier::new(
                    ModelHandle::new(ModelRole::Classifier, spec),
                    config.classifier_labels.clone(),
                    settings,
                ))
            }
        };

        let recognizer = VisionRecognizer::new(
            ModelHandle::new(ModelRole::Ocr, ocr_spec),
            config.ocr_languages.clone(),
            settings,
        );

        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new(
                config.download_timeout_secs,
                config.max_image_bytes,
            )?),
            recognizer: Arc::new(recognizer),
            classifier,
            validator: PlateValidator::new(config.grammar()?, config.confidence_threshold),
            max_image_bytes: config.max_image_bytes,
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn VehicleClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    /// Whether brand/type come from a real classifier.
    pub fn classifier_enabled(&self) -> bool {
        self.classifier.is_enabled()
    }

    /// Identify the vehicle at `url`.
    pub async fn identify(&self, url: &str) -> Result<IdentificationResult, IdentifyError> {
        self.run(url).await.map(|report| report.result)
    }

    /// Identify the vehicle at `url`, with timings and degradations.
    ///
    /// # Errors
    /// Only acquisition failures (bad URL, fetch failure, non-image content)
    /// and a crashed plate worker are errors. Model failures degrade.
    pub async fn run(&self, url: &str) -> Result<IdentifyReport, IdentifyError> {
        let total_start = Instant::now();
        self.enter(Stage::Received);
        info!("Identifying vehicle: {}", url.trim());

        // ── Step 1: Acquire ──────────────────────────────────────────────────
        self.enter(Stage::Acquiring);
        let fetch_start = Instant::now();
        let image = match acquire(self.fetcher.as_ref(), url, self.max_image_bytes).await {
            Ok(image) => Arc::new(image),
            Err(e) => {
                warn!("Acquisition failed: {}", e);
                self.enter(Stage::Failed);
                return Err(e);
            }
        };
        let fetch_ms = fetch_start.elapsed().as_millis() as u64;

        // ── Step 2: Recognize ∥ classify ─────────────────────────────────────
        self.enter(Stage::Recognizing);
        self.enter(Stage::Classifying);

        let plate_task = {
            let recognizer = Arc::clone(&self.recognizer);
            let image = Arc::clone(&image);
            AbortOnDropHandle::new(tokio::spawn(async move {
                let start = Instant::now();
                let candidates = recognizer.recognize(&image).await;
                (candidates, start.elapsed().as_millis() as u64)
            }))
        };
        let vehicle_task = {
            let classifier = Arc::clone(&self.classifier);
            let image = Arc::clone(&image);
            AbortOnDropHandle::new(tokio::spawn(async move {
                let start = Instant::now();
                let outcome = classify_or_degrade(classifier.as_ref(), &image).await;
                (outcome, start.elapsed().as_millis() as u64)
            }))
        };
        let (plate_joined, vehicle_joined) = tokio::join!(plate_task, vehicle_task);

        let mut degraded = Vec::new();

        let (candidates, recognize_ms) = match plate_joined {
            Ok((Ok(candidates), ms)) => (candidates, ms),
            Ok((Err(e), ms)) => {
                warn!("{}; plate reported as not detected", e);
                self.progress.on_degraded(&e);
                degraded.push(e);
                (Vec::new(), ms)
            }
            Err(join_err) => {
                warn!("Plate worker crashed: {}", join_err);
                self.enter(Stage::Failed);
                return Err(IdentifyError::Internal(format!(
                    "plate recognition worker failed: {join_err}"
                )));
            }
        };

        let (vehicle, classify_ms) = match vehicle_joined {
            Ok(((label, failure), ms)) => {
                if let Some(e) = failure {
                    self.progress.on_degraded(&e);
                    degraded.push(e);
                }
                (label, ms)
            }
            Err(join_err) => {
                let e = StageError::Classification {
                    detail: format!("classifier worker failed: {join_err}"),
                };
                warn!("{}", e);
                self.progress.on_degraded(&e);
                degraded.push(e);
                (VehicleLabel::unknown(), 0)
            }
        };

        // ── Step 3: Validate ─────────────────────────────────────────────────
        self.enter(Stage::Validating);
        let plate = self.validator.validate(&candidates);

        // ── Step 4: Assemble ─────────────────────────────────────────────────
        let stats = IdentifyStats {
            fetch_ms,
            recognize_ms,
            classify_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
            candidates: candidates.len(),
            image_width: image.width(),
            image_height: image.height(),
        };
        info!(
            "Identified plate='{}' brand='{}' type='{}' in {}ms",
            plate.text, vehicle.brand, vehicle.kind, stats.total_ms
        );
        self.enter(Stage::Completed);

        Ok(IdentifyReport {
            result: IdentificationResult { plate, vehicle },
            stats,
            degraded,
        })
    }

    fn enter(&self, stage: Stage) {
        debug!("Stage → {}", stage);
        self.progress.on_stage(stage);
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("validator", &self.validator)
            .field("classifier_enabled", &self.classifier.is_enabled())
            .field("max_image_bytes", &self.max_image_bytes)
            .finish_non_exhaustive()
    }
}

/// Identify the vehicle at `url` with a one-off [`Identifier`].
///
/// Model handles are process-wide, so repeated calls do not pay
/// initialisation again; only the HTTP client is rebuilt.
pub async fn identify(
    url: impl AsRef<str>,
    config: &IdentifyConfig,
) -> Result<IdentificationResult, IdentifyError> {
    Identifier::new(config)?.identify(url.as_ref()).await
}

/// Synchronous wrapper around [`identify`].
///
/// Creates a new tokio runtime internally. Do not call from within an
/// existing tokio runtime; use [`identify`] instead.
pub fn identify_sync(
    url: impl AsRef<str>,
    config: &IdentifyConfig,
) -> Result<IdentificationResult, IdentifyError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IdentifyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(identify(url, config))
}
