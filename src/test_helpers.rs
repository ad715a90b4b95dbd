//! Shared test utilities for the clickin test suite.
//!
//! Provides in-memory encoded images and ready-made sessions, so unit tests
//! never need fixture files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut s = session();
//! let id = s.add_image(&png_bytes(400, 300, [255, 0, 0, 255])).unwrap();
//! assert_eq!(text_of(&s, id), None);
//! ```

use crate::config::EditorConfig;
use crate::scene::{ObjectId, ObjectKind};
use crate::session::Session;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Encoded images
// =========================================================================

/// A solid-color PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A gradient JPEG, so the encoder has something to compress.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .unwrap();
    buf
}

// =========================================================================
// Sessions
// =========================================================================

/// A session with stock config and no fonts.
pub fn session() -> Session {
    session_with(EditorConfig::default())
}

pub fn session_with(config: EditorConfig) -> Session {
    Session::new(config).unwrap()
}

// =========================================================================
// Lookups
// =========================================================================

/// Content of a text object, or `None` if `id` is not text. Panics if `id`
/// does not exist.
pub fn text_of(session: &Session, id: ObjectId) -> Option<String> {
    let object = session
        .scene()
        .get(id)
        .unwrap_or_else(|| panic!("object {id} not found in scene"));
    match &object.kind {
        ObjectKind::Text(text) => Some(text.content.clone()),
        _ => None,
    }
}
