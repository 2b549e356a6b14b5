//! Raw frames handed over by the capture backend.
//!
//! These never leave the process: the producer converts them to RGB,
//! downscales and encodes them before anything is written to the stream.

use std::time::Instant;

use image::RgbImage;

use crate::error::CaptureError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha/padding (GDI, DXGI).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed capture of one monitor.
///
/// `data` holds `height` rows of `stride` bytes; `stride` may exceed
/// `width * bytes_per_pixel` when the backend pads rows.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes.
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// A tightly packed frame (`stride == width * bpp`).
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
            data,
            timestamp: Instant::now(),
        }
    }

    /// Wrap an RGB image without copying.
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::packed(width, height, PixelFormat::Rgb8, image.into_raw())
    }

    /// Total byte size the bitmap must occupy.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Convert to a packed RGB image, dropping padding and alpha.
    pub fn to_rgb_image(&self) -> Result<RgbImage, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::MalformedFrame("zero-sized frame"));
        }
        let bpp = self.format.bytes_per_pixel();
        if (self.stride as usize) < self.width as usize * bpp {
            return Err(CaptureError::MalformedFrame("stride shorter than row"));
        }
        if self.data.len() < self.byte_len() {
            return Err(CaptureError::MalformedFrame("buffer shorter than stride * height"));
        }

        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in self.data.chunks_exact(self.stride as usize).take(self.height as usize) {
            let pixels = &row[..self.width as usize * bpp];
            match self.format {
                PixelFormat::Rgb8 => out.extend_from_slice(pixels),
                PixelFormat::Rgba8 => {
                    for px in pixels.chunks_exact(4) {
                        out.extend_from_slice(&px[..3]);
                    }
                }
                PixelFormat::Bgra8 => {
                    for px in pixels.chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0]]);
                    }
                }
            }
        }

        RgbImage::from_raw(self.width, self.height, out)
            .ok_or(CaptureError::MalformedFrame("rgb buffer size mismatch"))
    }
}
