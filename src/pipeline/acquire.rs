//! Image acquisition: download a URL and decode it into a raster.
//!
//! ## Why validate twice?
//!
//! The declared `Content-Type` is checked before any decoding so that an
//! HTML error page served with status 200 (a common CDN failure mode) is
//! reported as "not an image" instead of a confusing decoder error. The bytes
//! are then sniffed and decoded; a server that labels a truncated JPEG as
//! `image/jpeg` still fails cleanly with [`IdentifyError::UndecodableImage`].
//!
//! No retries happen here. A transient failure surfaces as a fetch error and
//! the caller resubmits.

use crate::error::IdentifyError;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::time::Duration;
use tracing::{debug, info};

/// Raw bytes plus the content type the server declared.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// `None` when the response carried no `Content-Type` header.
    pub content_type: Option<String>,
}

/// Fetch-bytes-by-URL collaborator.
///
/// Implementations must apply their own timeout and map transport failures
/// to the fetch variants of [`IdentifyError`].
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, IdentifyError>;
}

/// [`ImageFetcher`] over HTTP(S) using a shared `reqwest` client.
///
/// The body is streamed and abandoned as soon as it passes `max_bytes`, and
/// a non-image `Content-Type` is rejected before any of the body is read.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout_secs` and whose
    /// bodies may not exceed `max_bytes`.
    pub fn new(timeout_secs: u64, max_bytes: usize) -> Result<Self, IdentifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IdentifyError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
            max_bytes,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, IdentifyError> {
        info!("Downloading image from: {}", url);

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                IdentifyError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                IdentifyError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let mut response = self.client.get(url).send().await.map_err(map_err)?;

        if !response.status().is_success() {
            return Err(IdentifyError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let declared = content_type.clone().unwrap_or_default();
        if !is_image_content_type(&declared) {
            return Err(not_an_image(url, declared));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(IdentifyError::ImageTooLarge {
                    size: usize::try_from(length).unwrap_or(usize::MAX),
                    max: self.max_bytes,
                });
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(IdentifyError::ImageTooLarge {
                    size: bytes.len() + chunk.len(),
                    max: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!("Downloaded {} bytes ({:?})", bytes.len(), content_type);

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// A decoded image owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub raster: DynamicImage,
    pub format: ImageFormat,
    pub content_type: String,
    pub size_bytes: usize,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }
}

/// Check that the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether a declared content type names an image (`image/*`).
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Fetch `url`, validate the response, and decode it.
pub async fn acquire(
    fetcher: &dyn ImageFetcher,
    url: &str,
    max_image_bytes: usize,
) -> Result<SourceImage, IdentifyError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(IdentifyError::MissingUrl);
    }
    if !is_url(url) {
        return Err(IdentifyError::InvalidUrl {
            url: url.to_string(),
        });
    }

    let fetched = fetcher.fetch(url).await?;

    let content_type = fetched.content_type.unwrap_or_default();
    if !is_image_content_type(&content_type) {
        return Err(not_an_image(url, content_type));
    }

    decode(fetched.bytes, content_type, url, max_image_bytes)
}

fn not_an_image(url: &str, content_type: String) -> IdentifyError {
    IdentifyError::NotAnImage {
        url: url.to_string(),
        content_type: if content_type.is_empty() {
            "<missing>".to_string()
        } else {
            content_type
        },
    }
}

/// Sniff and decode image bytes.
fn decode(
    bytes: Vec<u8>,
    content_type: String,
    url: &str,
    max_image_bytes: usize,
) -> Result<SourceImage, IdentifyError> {
    if bytes.is_empty() {
        return Err(IdentifyError::EmptyImage {
            url: url.to_string(),
        });
    }
    if bytes.len() > max_image_bytes {
        return Err(IdentifyError::ImageTooLarge {
            size: bytes.len(),
            max: max_image_bytes,
        });
    }

    // Trust the magic bytes over the header: servers mislabel PNGs as JPEG
    // often enough that the header is only used as an image/non-image gate.
    let format = image::guess_format(&bytes).map_err(|e| IdentifyError::UndecodableImage {
        detail: e.to_string(),
    })?;
    let raster = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        IdentifyError::UndecodableImage {
            detail: e.to_string(),
        }
    })?;

    info!(
        "Decoded {:?} image {}x{} ({} bytes)",
        format,
        raster.width(),
        raster.height(),
        bytes.len()
    );

    Ok(SourceImage {
        raster,
        format,
        content_type,
        size_bytes: bytes.len(),
    })
}
