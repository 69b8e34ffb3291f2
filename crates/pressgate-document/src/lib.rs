// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressgate-document: Image handling for the Pressgate print engine.
//
// Decodes source images and renders the two print renditions: a fast lossy
// JPEG and a lossless archival PNG.

pub mod image;
pub mod render;

pub use crate::image::processor::ImageProcessor;
pub use render::FormatRenderer;
