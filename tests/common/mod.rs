//! Test doubles shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_vehicle_id::{
    FetchedImage, IdentifyConfig, IdentifyError, Identifier, ImageFetcher, OcrCandidate,
    SourceImage, StageError, TextRecognizer, VehicleClassifier, VehicleLabel,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CAR_URL: &str = "https://images.example.org/car.png";

/// A small solid PNG.
pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([40, 40, 40, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Serves the same payload for every URL and counts calls.
pub struct StaticFetcher {
    bytes: Vec<u8>,
    content_type: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(bytes: Vec<u8>, content_type: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            bytes,
            content_type: content_type.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn png() -> Arc<Self> {
        Self::new(png_bytes(64, 32), Some("image/png"))
    }

    pub fn html() -> Arc<Self> {
        Self::new(b"<html><body>404</body></html>".to_vec(), Some("text/html; charset=utf-8"))
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, IdentifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedImage {
            bytes: self.bytes.clone(),
            content_type: self.content_type.clone(),
        })
    }
}

/// Fails every fetch with a network error.
pub struct UnreachableFetcher;

#[async_trait]
impl ImageFetcher for UnreachableFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, IdentifyError> {
        Err(IdentifyError::DownloadFailed {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Returns a fixed OCR outcome and counts calls.
pub struct ScriptedRecognizer {
    outcome: Result<Vec<OcrCandidate>, StageError>,
    pub calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn reading(candidates: &[(&str, f32)]) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(candidates
                .iter()
                .map(|(t, c)| OcrCandidate::new(*t, *c))
                .collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(StageError::Recognition {
                detail: detail.to_string(),
            }),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub struct PanickingRecognizer;

#[async_trait]
impl TextRecognizer for PanickingRecognizer {
    async fn recognize(&self, _image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError> {
        panic!("ocr backend crashed");
    }
}

/// Reads nothing after a fixed delay.
pub struct SlowRecognizer(pub Duration);

#[async_trait]
impl TextRecognizer for SlowRecognizer {
    async fn recognize(&self, _image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

/// Never answers. Records when it starts and when its call is dropped.
#[derive(Default)]
pub struct StallingRecognizer {
    pub started: AtomicBool,
    pub dropped: Arc<AtomicBool>,
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextRecognizer for StallingRecognizer {
    async fn recognize(&self, _image: &SourceImage) -> Result<Vec<OcrCandidate>, StageError> {
        let _guard = SetOnDrop(Arc::clone(&self.dropped));
        self.started.store(true, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Always answers with the same label.
pub struct FixedClassifier(pub VehicleLabel);

#[async_trait]
impl VehicleClassifier for FixedClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<VehicleLabel, StageError> {
        Ok(self.0.clone())
    }
}

pub struct FailingClassifier;

#[async_trait]
impl VehicleClassifier for FailingClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<VehicleLabel, StageError> {
        Err(StageError::Classification {
            detail: "model offline".to_string(),
        })
    }
}

pub struct PanickingClassifier;

#[async_trait]
impl VehicleClassifier for PanickingClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<VehicleLabel, StageError> {
        panic!("classifier crashed");
    }
}

/// Default pipeline with the given fetcher and recognizer; classifier
/// disabled.
pub fn identifier(
    fetcher: Arc<dyn ImageFetcher>,
    recognizer: Arc<dyn TextRecognizer>,
) -> Identifier {
    Identifier::new(&IdentifyConfig::default())
        .unwrap()
        .with_fetcher(fetcher)
        .with_recognizer(recognizer)
}
