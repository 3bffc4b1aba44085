//! Configuration types for vehicle identification.
//!
//! All pipeline behaviour is controlled through [`IdentifyConfig`], built via
//! its [`IdentifyConfigBuilder`]. One struct holds every knob, so a config can
//! be shared across request handlers and logged as a whole.
//!
//! The plate grammar lives here too: plate formats differ per jurisdiction,
//! so the pattern is a setting with a default rather than a constant.

use crate::error::IdentifyError;
use crate::pipeline::llm::VisionSettings;
use crate::pipeline::validate::{
    PlateGrammar, RegexGrammar, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PLATE_PATTERN,
};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default download timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 10;

/// Default cap on downloaded image size (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the identification pipeline.
///
/// Built via [`IdentifyConfig::builder()`] or using
/// [`IdentifyConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_vehicle_id::{ClassifierMode, IdentifyConfig};
///
/// let config = IdentifyConfig::builder()
///     .confidence_threshold(0.6)
///     .ocr_languages(["es", "en"])
///     .classifier(ClassifierMode::vision())
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_languages, vec!["es", "en"]);
/// ```
#[derive(Clone)]
pub struct IdentifyConfig {
    /// Timeout for the image download, in seconds. Default: 10.
    pub download_timeout_secs: u64,

    /// Largest accepted image payload, in bytes. Default: 10 MiB.
    pub max_image_bytes: usize,

    /// OCR readings must score strictly above this to be considered a plate.
    /// Default: 0.5.
    pub confidence_threshold: f32,

    /// Regex the normalised plate text must match. Anchored automatically.
    /// Ignored when [`plate_grammar`](Self::plate_grammar) is set.
    pub plate_pattern: String,

    /// Custom grammar that replaces the regex entirely.
    pub plate_grammar: Option<Arc<dyn PlateGrammar>>,

    /// ISO 639-1 codes of the languages expected on plates. Default: `["es"]`.
    pub ocr_languages: Vec<String>,

    /// Model for the OCR backend. `None` uses the provider default.
    pub model: Option<String>,

    /// Provider name for the OCR backend (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider for the OCR backend. Takes precedence over
    /// `provider_name` and `model`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Brand/type classification mode. Default: [`ClassifierMode::Disabled`].
    pub classifier: ClassifierMode,

    /// Optional closed vocabulary of `"<Brand> <type>"` labels.
    pub classifier_labels: Vec<String>,

    /// Sampling temperature for model calls. Default: 0.0.
    pub temperature: f32,

    /// Max reply tokens per model call. Default: 1024.
    pub max_tokens: usize,

    /// Longest image side sent to a model, in pixels. Default: 1600.
    pub max_image_dimension: u32,

    /// Optional observer for stage transitions.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        let vision = VisionSettings::default();
        Self {
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            plate_pattern: DEFAULT_PLATE_PATTERN.to_string(),
            plate_grammar: None,
            ocr_languages: vec!["es".to_string()],
            model: None,
            provider_name: None,
            provider: None,
            classifier: ClassifierMode::default(),
            classifier_labels: Vec::new(),
            temperature: vision.temperature,
            max_tokens: vision.max_tokens,
            max_image_dimension: vision.max_image_dimension,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IdentifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyConfig")
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("plate_pattern", &self.plate_pattern)
            .field(
                "plate_grammar",
                &self.plate_grammar.as_ref().map(|g| g.describe()),
            )
            .field("ocr_languages", &self.ocr_languages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("classifier", &self.classifier)
            .field("classifier_labels", &self.classifier_labels.len())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_image_dimension", &self.max_image_dimension)
            .finish()
    }
}

impl IdentifyConfig {
    /// Create a new builder for `IdentifyConfig`.
    pub fn builder() -> IdentifyConfigBuilder {
        IdentifyConfigBuilder {
            config: Self::default(),
        }
    }

    /// The grammar plates are validated against.
    pub fn grammar(&self) -> Result<Arc<dyn PlateGrammar>, IdentifyError> {
        match self.plate_grammar {
            Some(ref g) => Ok(Arc::clone(g)),
            None => Ok(Arc::new(RegexGrammar::new(&self.plate_pattern)?)),
        }
    }

    /// Sampling settings for the vision backends.
    pub fn vision_settings(&self) -> VisionSettings {
        VisionSettings {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_image_dimension: self.max_image_dimension,
        }
    }
}

/// Builder for [`IdentifyConfig`].
pub struct IdentifyConfigBuilder {
    config: IdentifyConfig,
}

impl fmt::Debug for IdentifyConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl IdentifyConfigBuilder {
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    pub fn plate_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.plate_pattern = pattern.into();
        self
    }

    pub fn plate_grammar(mut self, grammar: Arc<dyn PlateGrammar>) -> Self {
        self.config.plate_grammar = Some(grammar);
        self
    }

    pub fn ocr_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn classifier(mut self, mode: ClassifierMode) -> Self {
        self.config.classifier = mode;
        self
    }

    pub fn classifier_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.classifier_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IdentifyConfig, IdentifyError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(IdentifyError::InvalidConfig(format!(
                "confidence threshold must be within 0–1, got {}",
                c.confidence_threshold
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(IdentifyError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(IdentifyError::InvalidConfig(
                "max image bytes must be > 0".into(),
            ));
        }
        if c.max_image_dimension < 64 {
            return Err(IdentifyError::InvalidConfig(format!(
                "max image dimension must be ≥ 64, got {}",
                c.max_image_dimension
            )));
        }
        if c.max_tokens == 0 {
            return Err(IdentifyError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        if c.ocr_languages.iter().any(|l| l.trim().is_empty()) {
            return Err(IdentifyError::InvalidConfig(
                "OCR language codes must not be blank".into(),
            ));
        }
        if c.plate_grammar.is_none() {
            RegexGrammar::new(&c.plate_pattern)?;
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How brand and type are produced.
///
/// | Mode | Output | Cost |
/// |------|--------|------|
/// | `Disabled` | `("not implemented", "not implemented")` | none |
/// | `Vision`   | best `"<Brand> <type>"` label, split | one model call |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClassifierMode {
    /// No classification capability; fixed sentinel output. The default.
    #[default]
    Disabled,
    /// Classify with a vision-language model. With both fields `None` the
    /// OCR backend's provider is reused.
    Vision {
        provider_name: Option<String>,
        model: Option<String>,
    },
}

impl ClassifierMode {
    /// Vision classification sharing the OCR backend's provider.
    pub fn vision() -> Self {
        ClassifierMode::Vision {
            provider_name: None,
            model: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, ClassifierMode::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = IdentifyConfig::default();
        assert_eq!(c.download_timeout_secs, 10);
        assert_eq!(c.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(c.confidence_threshold, 0.5);
        assert_eq!(c.ocr_languages, vec!["es"]);
        assert_eq!(c.classifier, ClassifierMode::Disabled);
        assert!(c.grammar().unwrap().matches("AB1234CD"));
    }

    #[test]
    fn builder_overrides() {
        let c = IdentifyConfig::builder()
            .download_timeout_secs(3)
            .provider_name("ollama")
            .model("llava")
            .temperature(5.0)
            .classifier(ClassifierMode::vision())
            .classifier_labels(["Seat hatchback"])
            .build()
            .unwrap();
        assert_eq!(c.download_timeout_secs, 3);
        assert_eq!(c.provider_name.as_deref(), Some("ollama"));
        assert_eq!(c.temperature, 2.0);
        assert!(c.classifier.is_enabled());
        assert_eq!(c.classifier_labels, vec!["Seat hatchback"]);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        for t in [-0.1, 1.5, f32::NAN] {
            let err = IdentifyConfig::builder()
                .confidence_threshold(t)
                .build()
                .unwrap_err();
            assert!(matches!(err, IdentifyError::InvalidConfig(_)));
        }
        assert!(IdentifyConfig::builder()
            .confidence_threshold(1.0)
            .build()
            .is_ok());
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(IdentifyConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
        assert!(IdentifyConfig::builder().max_image_bytes(0).build().is_err());
    }

    #[test]
    fn rejects_bad_pattern() {
        let err = IdentifyConfig::builder()
            .plate_pattern("[A-Z")
            .build()
            .unwrap_err();
        assert!(matches!(err, IdentifyError::InvalidConfig(_)));
    }

    #[test]
    fn custom_pattern_is_used() {
        let c = IdentifyConfig::builder()
            .plate_pattern("[0-9]{4}[A-Z]{3}")
            .build()
            .unwrap();
        let g = c.grammar().unwrap();
        assert!(g.matches("1234BCD"));
        assert!(!g.matches("AB1234CD"));
    }
}
