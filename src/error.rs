//! Error types for the edgequake-vehicle-id library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IdentifyError`] — **Fatal**: the request cannot produce a result at
//!   all (no URL, the URL does not serve an image, the download failed).
//!   Returned as `Err(IdentifyError)` from [`crate::identify::identify`] and
//!   mapped to an HTTP status by [`ErrorKind::status_code`].
//!
//! * [`StageError`] — **Non-fatal**: one branch of the pipeline (OCR or
//!   classification) failed and was degraded to its sentinel output. Stored
//!   inside [`crate::output::IdentifyReport`] so callers can see that a
//!   "not detected" plate came from a model failure rather than an empty
//!   photo.

use thiserror::Error;

/// The four outcome classes a caller can observe.
///
/// Every [`IdentifyError`] belongs to exactly one kind; the kind alone
/// decides the HTTP status and whether the message is safe to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed request fields.
    InvalidInput,
    /// Network failure, timeout or non-2xx status while fetching the image.
    FetchError,
    /// Wrong content type or undecodable bytes.
    InvalidImage,
    /// Anything unanticipated. The message is never shown to callers.
    InternalError,
}

impl ErrorKind {
    /// HTTP status code for this kind. Fetch errors count as
    /// caller-correctable, hence 400 rather than 502.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput | ErrorKind::FetchError | ErrorKind::InvalidImage => 400,
            ErrorKind::InternalError => 500,
        }
    }

    /// Whether the error message may be returned verbatim to the caller.
    pub fn is_public(self) -> bool {
        !matches!(self, ErrorKind::InternalError)
    }
}

/// All fatal errors returned by the edgequake-vehicle-id library.
///
/// Branch-level failures use [`StageError`] and never surface here.
#[derive(Debug, Error)]
pub enum IdentifyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no URL, or an empty one.
    #[error("missing image URL: the request body must contain a non-empty \"url\" field")]
    MissingUrl,

    /// The URL is not an absolute HTTP/HTTPS URL.
    #[error("invalid URL '{url}': expected an http:// or https:// URL")]
    InvalidUrl { url: String },

    /// The request body could not be parsed.
    #[error("malformed request body: {detail}")]
    MalformedRequest { detail: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The download failed before a response was received.
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("failed to download '{url}': HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The declared content type is missing or not `image/*`.
    #[error("invalid image: content type '{content_type}' at '{url}' is not an image")]
    NotAnImage { url: String, content_type: String },

    /// The response body was empty.
    #[error("invalid image: '{url}' returned an empty body")]
    EmptyImage { url: String },

    /// The response body exceeds `max_image_bytes`.
    #[error("invalid image: {size} bytes exceeds the {max} byte limit")]
    ImageTooLarge { size: usize, max: usize },

    /// The bytes could not be decoded as a raster image.
    #[error("invalid image: could not decode image data: {detail}")]
    UndecodableImage { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured model provider could not be created.
    #[error("model provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IdentifyError {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentifyError::MissingUrl
            | IdentifyError::InvalidUrl { .. }
            | IdentifyError::MalformedRequest { .. } => ErrorKind::InvalidInput,
            IdentifyError::DownloadFailed { .. }
            | IdentifyError::DownloadTimeout { .. }
            | IdentifyError::HttpStatus { .. } => ErrorKind::FetchError,
            IdentifyError::NotAnImage { .. }
            | IdentifyError::EmptyImage { .. }
            | IdentifyError::ImageTooLarge { .. }
            | IdentifyError::UndecodableImage { .. } => ErrorKind::InvalidImage,
            IdentifyError::InvalidConfig(_)
            | IdentifyError::ProviderNotConfigured { .. }
            | IdentifyError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// The message a caller is allowed to see.
    ///
    /// Internal errors collapse to a fixed string so model or provider
    /// details never leak through the endpoint.
    pub fn public_message(&self) -> String {
        if self.kind().is_public() {
            self.to_string()
        } else {
            "internal error".to_string()
        }
    }
}

/// A non-fatal failure confined to one pipeline branch.
///
/// The branch output falls back to its sentinel value and the request still
/// succeeds.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The OCR capability failed; the plate is reported as not detected.
    #[error("text recognition failed: {detail}")]
    Recognition { detail: String },

    /// The classifier failed; brand and type are reported as unknown.
    #[error("vehicle classification failed: {detail}")]
    Classification { detail: String },
}
