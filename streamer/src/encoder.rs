use bytes::Bytes;
use image::{ImageBuffer, RgbImage};

use crate::camera::RawFrame;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("pixel buffer does not match {width}x{height} RGB8")]
    BadDimensions { width: u32, height: u32 },
    #[error("JPEG encoding failed: {0}")]
    Jpeg(String),
}

/// Turns a raw frame into a compressed byte buffer at a fixed quality.
pub trait FrameEncoder: Send {
    fn encode(&self, raw: &RawFrame) -> Result<Bytes, EncodeError>;
}

/// JPEG encoder at a configured quality level.
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Quality is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, raw: &RawFrame) -> Result<Bytes, EncodeError> {
        let img: RgbImage =
            ImageBuffer::from_raw(raw.width, raw.height, raw.pixels.clone()).ok_or(
                EncodeError::BadDimensions {
                    width: raw.width,
                    height: raw.height,
                },
            )?;

        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&img)
            .map_err(|e| EncodeError::Jpeg(e.to_string()))?;

        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_rgb_to_jpeg() {
        let raw = RawFrame {
            width: 2,
            height: 2,
            pixels: vec![0, 64, 128, 255, 0, 0, 0, 255, 0, 0, 0, 255],
        };
        let jpeg = JpegEncoder::new(80).encode(&raw).unwrap();
        // JPEG magic bytes
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let raw = RawFrame {
            width: 10,
            height: 10,
            pixels: vec![0; 7],
        };
        let result = JpegEncoder::new(80).encode(&raw);
        assert!(matches!(
            result,
            Err(EncodeError::BadDimensions {
                width: 10,
                height: 10
            })
        ));
    }

    #[test]
    fn quality_clamped_to_valid_range() {
        assert_eq!(JpegEncoder::new(0).quality(), 1);
        assert_eq!(JpegEncoder::new(255).quality(), 100);
        assert_eq!(JpegEncoder::new(80).quality(), 80);
    }
}
