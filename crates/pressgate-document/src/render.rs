// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format renderer: turns one source image into a fast lossy rendition and a
// lossless archival rendition, each written to its own file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::RenditionPair;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::image::ImageProcessor;

/// JPEG quality for the fast rendition.
pub const FAST_JPEG_QUALITY: u8 = 85;

/// Longest edge of the fast rendition in pixels.
pub const FAST_MAX_EDGE: u32 = 2400;

/// Writes renditions into a single output directory.
#[derive(Debug, Clone)]
pub struct FormatRenderer {
    output_dir: PathBuf,
    fast_quality: u8,
    fast_max_edge: u32,
}

impl FormatRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fast_quality: FAST_JPEG_QUALITY,
            fast_max_edge: FAST_MAX_EDGE,
        }
    }

    pub fn with_fast_settings(mut self, quality: u8, max_edge: u32) -> Self {
        self.fast_quality = quality;
        self.fast_max_edge = max_edge;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render both renditions of `source`.
    ///
    /// The source is decoded before anything is written, so undecodable input
    /// fails with `RenderFailure` and leaves no files behind. If the second
    /// write fails the first file is removed again.
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    pub fn render(&self, source: &[u8]) -> Result<RenditionPair> {
        let decoded = ImageProcessor::from_bytes(source)?;
        let digest = hex::encode(Sha256::digest(source));
        debug!(digest = &digest[..12], "source decoded");

        // Archival first: it is the expensive one and works on full resolution.
        let archival = decoded.to_png_archival_bytes()?;
        let fast = decoded
            .fit_within(self.fast_max_edge, self.fast_max_edge)
            .to_jpeg_bytes(self.fast_quality)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let token = rendition_token();
        let pair = RenditionPair {
            fast_path: self.output_dir.join(format!("{token}-fast.jpg")),
            archival_path: self.output_dir.join(format!("{token}-archival.png")),
            token,
        };

        write_renditions(&pair, &fast, &archival)?;

        info!(
            token = %pair.token,
            fast_bytes = fast.len(),
            archival_bytes = archival.len(),
            "renditions written"
        );
        Ok(pair)
    }
}

/// Write both files. On any failure whatever was written is removed again,
/// including a partially written fast rendition.
fn write_renditions(pair: &RenditionPair, fast: &[u8], archival: &[u8]) -> Result<()> {
    let written = std::fs::write(&pair.fast_path, fast)
        .and_then(|()| std::fs::write(&pair.archival_path, archival));
    if let Err(e) = written {
        warn!(error = %e, token = %pair.token, "rendition write failed, discarding pair");
        pair.cleanup();
        return Err(PressgateError::Io(e));
    }
    Ok(())
}

/// Time-ordered token with a random suffix so concurrent renders in the same
/// millisecond never collide.
fn rendition_token() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%3f"), &random[..8])
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn png_source(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 200, 255])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn valid_image_yields_two_distinct_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FormatRenderer::new(dir.path().join("renders"));
        let source = png_source(64, 48);

        let pair = renderer.render(&source).unwrap();

        assert_ne!(pair.fast_path, pair.archival_path);
        let fast = std::fs::read(&pair.fast_path).unwrap();
        let archival = std::fs::read(&pair.archival_path).unwrap();
        assert!(!fast.is_empty());
        assert!(!archival.is_empty());
        assert_eq!(
            image::guess_format(&fast).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            image::guess_format(&archival).unwrap(),
            ImageFormat::Png
        );
        // Source untouched.
        assert_eq!(source, png_source(64, 48));
    }

    #[test]
    fn fast_rendition_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FormatRenderer::new(dir.path()).with_fast_settings(70, 32);
        let pair = renderer.render(&png_source(128, 64)).unwrap();

        let fast = image::open(&pair.fast_path).unwrap();
        assert_eq!((fast.width(), fast.height()), (32, 16));
        let archival = image::open(&pair.archival_path).unwrap();
        assert_eq!((archival.width(), archival.height()), (128, 64));
    }

    #[test]
    fn invalid_input_produces_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FormatRenderer::new(dir.path());

        let err = renderer.render(b"<html>not an image</html>").unwrap_err();

        assert!(matches!(err, PressgateError::RenderFailure(_)));
        assert_eq!(files_in(dir.path()), 0);
    }

    fn pair_in(dir: &Path) -> RenditionPair {
        RenditionPair {
            token: "t".into(),
            fast_path: dir.join("t-fast.jpg"),
            archival_path: dir.join("t-archival.png"),
        }
    }

    #[test]
    fn failed_archival_write_removes_fast_file() {
        let dir = tempfile::tempdir().unwrap();
        let pair = pair_in(dir.path());
        // A directory in the way makes the archival write fail.
        std::fs::create_dir(&pair.archival_path).unwrap();

        let err = write_renditions(&pair, b"jpeg", b"png").unwrap_err();

        assert!(matches!(err, PressgateError::Io(_)));
        assert!(!pair.fast_path.exists());
    }

    #[test]
    fn failed_fast_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut pair = pair_in(dir.path());
        pair.fast_path = dir.path().join("missing").join("t-fast.jpg");

        assert!(write_renditions(&pair, b"jpeg", b"png").is_err());

        assert!(!pair.archival_path.exists());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn pairs_never_share_paths() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FormatRenderer::new(dir.path());
        let source = png_source(8, 8);
        let a = renderer.render(&source).unwrap();
        let b = renderer.render(&source).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.fast_path, b.fast_path);
        assert_eq!(files_in(dir.path()), 4);

        a.cleanup();
        assert_eq!(files_in(dir.path()), 2);
    }
}
