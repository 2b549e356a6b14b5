//! Default [`ImageCodec`] backed by the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbImage};

use super::ImageCodec;
use crate::error::CodecError;

/// Lanczos3 resampling, baseline JPEG output, PNG/JPEG template input.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn downscale(&self, image: &RgbImage, width: u32, height: u32) -> RgbImage {
        imageops::resize(image, width, height, FilterType::Lanczos3)
    }

    fn encode(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(image.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, CodecError> {
        image::load_from_memory(bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}
