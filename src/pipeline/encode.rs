//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Vision-model APIs accept images as base64 data embedded in the JSON
//! request body. PNG is chosen over JPEG because it is lossless: plate
//! characters are small and JPEG ringing around them confuses OCR.
//! `detail: "high"` asks GPT-4-class models for the full tile budget, without
//! which a plate that is 5 % of the frame becomes unreadable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a raster as a base64 PNG ready for a vision-model request.
///
/// Images larger than `max_dimension` on either side are downscaled first
/// (aspect ratio kept). Phone photos are often 4000 px wide; past ~1600 px
/// the extra pixels cost tokens without improving recognition.
pub fn encode_image(
    img: &DynamicImage,
    max_dimension: u32,
) -> Result<ImageData, image::ImageError> {
    let scaled;
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        scaled = img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        );
        debug!(
            "Downscaled {}x{} → {}x{} for encoding",
            img.width(),
            img.height(),
            scaled.width(),
            scaled.height()
        );
        &scaled
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_image(&img, 1600).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&decoded).expect("valid png");
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn encode_downscales_large_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 100, Rgba([0, 0, 0, 255])));
        let data = encode_image(&img, 200).expect("encode should succeed");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&decoded).expect("valid png");
        assert_eq!((back.width(), back.height()), (200, 50));
    }
}
