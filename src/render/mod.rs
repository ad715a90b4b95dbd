//! Rendering: drawing surfaces, pixel filters, and placement geometry.
//!
//! | Concern | Where |
//! |---|---|
//! | **Surface trait** | [`Surface`], implemented by [`RasterSurface`] |
//! | **Pixel filters** | [`Filter`] (brightness, contrast, saturation, hue, gamma, convolution) |
//! | **Geometry** | fit-to-canvas, bounding boxes, export sizing, crop conversion |
//! | **Draw parameters** | [`DrawImage`], [`DrawText`], [`Color`], [`Rect`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for placement math (unit testable)
//! - **Parameters**: Data structures describing draw operations
//! - **Backend**: [`Surface`] trait + [`RasterSurface`]
//! - **Filters**: Per-pixel operations applied to image layers

pub mod backend;
mod calculations;
pub mod filters;
mod params;
pub mod raster;

pub use backend::{Surface, SurfaceError};
pub use calculations::{
    bounding_box, centered_position, crop_from_region, displayed_size, export_dimensions,
    fit_scale,
};
pub use filters::{Filter, SHARPEN_KERNEL};
pub use params::{Color, ColorParseError, DrawImage, DrawText, Rect, TextMetrics};
pub use raster::{DEFAULT_MAX_PIXELS, FontBook, RasterSurface, check_pixel_budget};
