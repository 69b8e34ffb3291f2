// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, bound, and encode print images using the `image`
// crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::DynamicImage;
use pressgate_core::error::PressgateError;
use tracing::{debug, info, instrument};

/// A decoded image on its way to becoming a print rendition.
///
/// Operations consume `self` and return a new processor, so the caller's
/// source bytes are never touched.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&bytes)?
///     .fit_within(2400, 2400)
///     .to_jpeg_bytes(85)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Decode raw encoded bytes (JPEG, PNG, WebP, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PressgateError> {
        let img = image::load_from_memory(data).map_err(|err| {
            PressgateError::RenderFailure(format!("failed to decode image: {err}"))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Downscale to fit within `max_width` x `max_height`, preserving aspect
    /// ratio. Images already inside the box are returned unchanged.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            max_width,
            max_height,
            "Downscaling image"
        );
        let resized = self
            .image
            .resize(max_width, max_height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Encode as baseline JPEG with the given quality (1-100). Alpha is
    /// dropped.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, PressgateError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|err| {
            PressgateError::RenderFailure(format!("JPEG encoding failed: {err}"))
        })?;
        Ok(buffer)
    }

    /// Encode as PNG with the slowest, smallest lossless settings.
    pub fn to_png_archival_bytes(&self) -> Result<Vec<u8>, PressgateError> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);
        self.image.write_with_encoder(encoder).map_err(|err| {
            PressgateError::RenderFailure(format!("PNG encoding failed: {err}"))
        })?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn fit_within_keeps_small_images() {
        let p = ImageProcessor::from_dynamic(gradient(40, 30)).fit_within(100, 100);
        assert_eq!((p.width(), p.height()), (40, 30));
    }

    #[test]
    fn fit_within_preserves_aspect() {
        let p = ImageProcessor::from_dynamic(gradient(400, 200)).fit_within(100, 100);
        assert_eq!((p.width(), p.height()), (100, 50));
    }

    #[test]
    fn encoders_produce_decodable_output() {
        let p = ImageProcessor::from_dynamic(gradient(32, 32));
        let jpeg = p.to_jpeg_bytes(85).unwrap();
        let png = p.to_png_archival_bytes().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&png[..4], b"\x89PNG");
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!(back.to_rgb8(), gradient(32, 32).to_rgb8());
    }

    #[test]
    fn garbage_is_a_render_failure() {
        let err = ImageProcessor::from_bytes(b"definitely not an image").err().unwrap();
        assert!(matches!(err, PressgateError::RenderFailure(_)));
    }
}
