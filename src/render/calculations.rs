//! Pure geometry for placement, export sizing, and cropping.
//!
//! All functions here are pure and testable without any pixels.

use super::params::Rect;
use crate::scene::{CropRect, Origin, Placement};

/// Scale that fits an image into `fill` (a fraction) of the canvas, keeping
/// aspect ratio. Small images are scaled up as well as large ones down.
///
/// # Examples
/// ```
/// # use clickin::render::fit_scale;
/// // 1600x1200 into 80% of 800x600 → 640x480
/// assert_eq!(fit_scale((800, 600), (1600, 1200), 0.8), 0.4);
/// ```
pub fn fit_scale(canvas: (u32, u32), image: (u32, u32), fill: f64) -> f64 {
    let (cw, ch) = canvas;
    let (iw, ih) = image;
    if iw == 0 || ih == 0 {
        return 1.0;
    }
    f64::min(
        cw as f64 * fill / iw as f64,
        ch as f64 * fill / ih as f64,
    )
}

/// Top-left position that centers a box of `size` on the canvas.
pub fn centered_position(canvas: (u32, u32), size: (f64, f64)) -> (f64, f64) {
    (
        (canvas.0 as f64 - size.0) / 2.0,
        (canvas.1 as f64 - size.1) / 2.0,
    )
}

/// Displayed size of an object with intrinsic size `size` under `placement`.
pub fn displayed_size(size: (f64, f64), placement: &Placement) -> (f64, f64) {
    (size.0 * placement.scale_x, size.1 * placement.scale_y)
}

/// Unrotated bounding box of an object in scene coordinates, given its
/// displayed size. Accounts for the origin on each axis.
pub fn bounding_box(placement: &Placement, displayed: (f64, f64)) -> Rect {
    let shift = |origin: Origin, extent: f64| match origin {
        Origin::Start => 0.0,
        Origin::Center => extent / 2.0,
    };
    Rect::new(
        placement.left - shift(placement.origin_x, displayed.0),
        placement.top - shift(placement.origin_y, displayed.1),
        displayed.0,
        displayed.1,
    )
}

/// Output raster size for a base image of intrinsic `size` under
/// `placement`, at `multiplier` times its displayed size.
///
/// # Examples
/// ```
/// # use clickin::render::export_dimensions;
/// # use clickin::scene::Placement;
/// let p = Placement::at(0.0, 0.0).with_scale(0.5);
/// assert_eq!(export_dimensions((400, 300), &p, 2.0), (400, 300));
/// ```
pub fn export_dimensions(size: (u32, u32), placement: &Placement, multiplier: f64) -> (u32, u32) {
    let (w, h) = displayed_size((size.0 as f64, size.1 as f64), placement);
    (
        (w * multiplier).round().max(1.0) as u32,
        (h * multiplier).round().max(1.0) as u32,
    )
}

/// Convert a crop region drawn over a displayed image back into source pixels.
///
/// - `region`: the crop box in scene coordinates
/// - `image_origin`: the image's top-left corner in scene coordinates
/// - `scale`: the image's scale when cropping started
/// - `prior`: the crop already applied (its offset is added)
/// - `source`: full source raster dimensions, used to clamp
///
/// Returns `None` when the region misses the image entirely.
pub fn crop_from_region(
    region: Rect,
    image_origin: (f64, f64),
    scale: (f64, f64),
    prior: Option<CropRect>,
    source: (u32, u32),
) -> Option<CropRect> {
    let (sx, sy) = scale;
    if sx <= 0.0 || sy <= 0.0 || source.0 == 0 || source.1 == 0 {
        return None;
    }
    let (offset_x, offset_y) = prior.map_or((0, 0), |c| (c.x, c.y));
    let (limit_w, limit_h) = prior.map_or(source, |c| (c.x + c.width, c.y + c.height));

    let x = ((region.x - image_origin.0) / sx).round() + offset_x as f64;
    let y = ((region.y - image_origin.1) / sy).round() + offset_y as f64;
    let w = (region.width / sx).round();
    let h = (region.height / sy).round();

    // Intersect with the currently visible part of the source
    let x0 = x.max(offset_x as f64);
    let y0 = y.max(offset_y as f64);
    let x1 = (x + w).min(limit_w.min(source.0) as f64);
    let y1 = (y + h).min(limit_h.min(source.1) as f64);
    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }
    Some(CropRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}
