//! Drawing surface trait and shared types.
//!
//! The [`Surface`] trait is the drawable canvas the compositor renders onto.
//! It supports three operations: measure a text block, draw an image, and draw
//! a text block. Layout (where things go) is decided by
//! [`compose`](crate::compose); the surface only puts pixels down.
//!
//! The production implementation is
//! [`RasterSurface`](super::raster::RasterSurface), which renders into an
//! in-memory RGBA buffer with the `image` crate and rasterizes glyphs with
//! `ab_glyph`.

use super::params::{DrawImage, DrawText, TextMetrics};
use crate::scene::TextStyle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid font {path}: {reason}")]
    InvalidFont { path: String, reason: String },
    #[error("Drawing failed: {0}")]
    DrawFailed(String),
    #[error("Raster of {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        width: u64,
        height: u64,
        max_pixels: u64,
    },
}

/// Trait for drawing surfaces.
///
/// Coordinates are surface pixels with the origin at the top-left corner.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Size of `text` laid out with `style` at scale 1.
    fn measure_text(&self, text: &str, style: &TextStyle) -> TextMetrics;

    /// Draw a raster into its destination box.
    fn draw_image(&mut self, op: &DrawImage<'_>) -> Result<(), SurfaceError>;

    /// Draw a text block.
    fn draw_text(&mut self, op: &DrawText<'_>) -> Result<(), SurfaceError>;
}
