//! # Clickin
//!
//! The editing-session core of a layered photo editor. A session holds a
//! base photograph, text and emoji stickers stacked above it, per-image
//! color adjustments, a crop, and a linear undo/redo history. Exports are
//! PNGs rendered at twice the displayed size of the base image.
//!
//! # Architecture: One Owner, Pure Layers Below
//!
//! All mutable editor state lives in a single [`session::Session`]. Every
//! user action is an intent method on it that mutates the scene and layer
//! registry together and then records a snapshot:
//!
//! ```text
//! intent  →  Session  →  Scene + LayerRegistry  →  History snapshot
//!                      ↘  adjust / compose (pure)  →  pixels, PNG bytes
//! ```
//!
//! Everything below the session is a plain value or a pure function, so unit
//! tests exercise placement math, filters, and flattening without a session.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Session controller: intents, selection, crop, undo/redo, export, captions |
//! | [`scene`] | Scene graph: ordered drawable objects with placement and z-order |
//! | [`layers`] | Layer registry: display names and visibility per object |
//! | [`history`] | Snapshot stack with a cursor |
//! | [`adjust`] | Adjustment sliders and the filter chain they build |
//! | [`compose`] | Flattening the scene onto a surface and PNG encoding |
//! | [`render`] | Surface trait, raster backend, pixel filters, geometry |
//! | [`ingest`] | Decoding uploads and the content-addressed source store |
//! | [`caption`] | AI caption service client |
//! | [`script`] | TOML edit scripts replayed against a session |
//! | [`config`] | `editor.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting for script runs |
//!
//! # Design Decisions
//!
//! ## Snapshots Reference Pixels by Hash
//!
//! A history snapshot is JSON of the scene and layer registry. Decoded
//! images are kept once in [`ingest::SourceStore`], keyed by the SHA-256 of
//! their encoded bytes, and objects refer to them by that key. Undo never
//! re-decodes, and a hundred snapshots of one photo hold one copy of it.
//!
//! ## Adjustments Are Rendered, Not Stacked
//!
//! Slider values are session state. Moving a slider rebuilds the whole
//! filter chain from the current values and re-renders the selected image
//! from its source pixels, so the result never depends on slider history.

pub mod adjust;
pub mod caption;
pub mod compose;
pub mod config;
pub mod history;
pub mod ingest;
pub mod layers;
pub mod output;
pub mod render;
pub mod scene;
pub mod script;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;
