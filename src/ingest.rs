//! Image ingestion: raw bytes in, decoded rasters out.
//!
//! File pickers, drag-and-drop, and clipboard paste all reduce to a byte
//! buffer. This module decodes those buffers into RGBA rasters and keeps them
//! in a session-owned [`SourceStore`]. Scene objects only hold a
//! [`SourceId`], so snapshots stay small and restoring one never re-decodes.
//!
//! ## Source identity
//!
//! A [`SourceId`] is the SHA-256 of the encoded bytes. Loading the same file
//! twice shares one raster. The store is append-only for the lifetime of the
//! session: undo can bring back an image removed earlier, so its pixels must
//! still be there.
//!
//! ## Batches
//!
//! Several files dropped at once are decoded in parallel with
//! [rayon](https://docs.rs/rayon). Results come back in input order and each
//! one is inserted independently, so one corrupt file doesn't block the rest.

use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unrecognized image format")]
    UnknownFormat,
    #[error("Unsupported image format: {0:?}")]
    UnsupportedFormat(ImageFormat),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels")]
    Empty,
}

/// Formats whose decoders are compiled in.
const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Tiff,
    ImageFormat::Gif,
];

/// Content hash of an encoded image, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(
            digest
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>(),
        )
    }

    #[cfg(test)]
    pub(crate) fn from_hex(hex: &str) -> Self {
        Self(hex.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell sources apart in logs
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// A decoded raster and the identity of the bytes it came from.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub id: SourceId,
    pub raster: RgbaImage,
}

impl Decoded {
    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }
}

/// Decode one encoded image into RGBA.
pub fn decode(bytes: &[u8]) -> Result<Decoded, IngestError> {
    let format = image::guess_format(bytes).map_err(|_| IngestError::UnknownFormat)?;
    if !DECODABLE.contains(&format) {
        return Err(IngestError::UnsupportedFormat(format));
    }
    let raster = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(IngestError::Empty);
    }
    Ok(Decoded {
        id: SourceId::for_bytes(bytes),
        raster,
    })
}

/// Decode a batch in parallel. Output order matches input order.
pub fn decode_many<B: AsRef<[u8]> + Sync>(batch: &[B]) -> Vec<Result<Decoded, IngestError>> {
    batch.par_iter().map(|bytes| decode(bytes.as_ref())).collect()
}

/// Decoded rasters available to the session, keyed by content hash.
#[derive(Debug, Default)]
pub struct SourceStore {
    rasters: HashMap<SourceId, RgbaImage>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a decoded raster. Re-inserting known bytes keeps the first copy.
    pub fn insert(&mut self, decoded: Decoded) -> SourceId {
        let id = decoded.id.clone();
        self.rasters.entry(decoded.id).or_insert(decoded.raster);
        id
    }

    pub fn get(&self, id: &SourceId) -> Option<&RgbaImage> {
        self.rasters.get(id)
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.rasters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}
