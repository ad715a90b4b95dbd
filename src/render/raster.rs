//! In-memory raster surface built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Scale a layer | `image::imageops::resize` with `Lanczos3` |
//! | Composite (unrotated) | `image::imageops::overlay` (alpha blended) |
//! | Composite (rotated) | inverse-mapped nearest-neighbour sampling |
//! | Glyph outlines | `ab_glyph` (`FontArc`, `PxScale`, `ScaleFont`) |
//! | Blending | `image::Pixel::blend` (source-over) |
//!
//! Text is first drawn into a transparent layer the size of its box, then
//! composited exactly like an image, so rotation and scaling behave the same
//! for every object kind.
//!
//! ## Fonts
//!
//! Glyphs are only rasterized for families registered in a [`FontBook`]
//! (config `[fonts]`). For any other family the text box background and
//! underline are still drawn, and text is measured with a fixed advance so
//! layout stays stable. `bold` is emulated with a second pass one pixel to the
//! right; italics need an italic font file registered under its own family.

use super::backend::{Surface, SurfaceError};
use super::params::{Color, DrawImage, DrawText, Rect, TextMetrics};
use crate::scene::{TextAlign, TextStyle};
use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Line box height relative to the font size.
const FONT_SIZE_MULT: f64 = 1.13;

/// Advance per character, relative to the font size, when no font is loaded.
const FALLBACK_ADVANCE: f64 = 0.6;

/// Pixel limit for surfaces built without an explicit one (10000 x 10000).
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Check a raster size against `max_pixels` before allocating it.
///
/// Sizes are rounded pixel extents; anything that would not fit in `u32`
/// per axis, or whose RGBA buffer would overflow, is rejected too.
pub fn check_pixel_budget(
    width: f64,
    height: f64,
    max_pixels: u64,
) -> Result<(u32, u32), SurfaceError> {
    // Saturating casts; NaN becomes 0
    let (w, h) = (width.max(0.0) as u64, height.max(0.0) as u64);
    let too_large = || SurfaceError::TooLarge {
        width: w,
        height: h,
        max_pixels,
    };
    let pixels = w.checked_mul(h).ok_or_else(too_large)?;
    let bytes = pixels.checked_mul(4).ok_or_else(too_large)?;
    if pixels > max_pixels || usize::try_from(bytes).is_err() {
        return Err(too_large());
    }
    let w = u32::try_from(w).map_err(|_| too_large())?;
    let h = u32::try_from(h).map_err(|_| too_large())?;
    Ok((w, h))
}

/// Loaded fonts keyed by case-insensitive family name.
#[derive(Debug, Default, Clone)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `family = "path"` entry. Relative paths resolve against
    /// `base_dir`.
    pub fn load(
        entries: &BTreeMap<String, String>,
        base_dir: &Path,
    ) -> Result<Self, SurfaceError> {
        let mut book = Self::new();
        for (family, path) in entries {
            let full = base_dir.join(path);
            let data = std::fs::read(&full)?;
            let font = FontArc::try_from_vec(data).map_err(|e| SurfaceError::InvalidFont {
                path: full.display().to_string(),
                reason: e.to_string(),
            })?;
            log::debug!("loaded font '{family}' from {}", full.display());
            book.insert(family, font);
        }
        Ok(book)
    }

    pub fn insert(&mut self, family: &str, font: FontArc) {
        self.fonts.insert(family.to_lowercase(), font);
    }

    pub fn get(&self, family: &str) -> Option<&FontArc> {
        self.fonts.get(&family.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// RGBA surface. Starts fully transparent.
///
/// Every raster it allocates (the surface itself and each scaled layer) is
/// held to `max_pixels`.
pub struct RasterSurface<'f> {
    canvas: RgbaImage,
    fonts: &'f FontBook,
    max_pixels: u64,
}

impl<'f> RasterSurface<'f> {
    pub fn new(width: u32, height: u32, fonts: &'f FontBook) -> Result<Self, SurfaceError> {
        Self::with_limit(width, height, Color::TRANSPARENT, fonts, DEFAULT_MAX_PIXELS)
    }

    /// Surface pre-filled with `background`.
    pub fn filled(
        width: u32,
        height: u32,
        background: Color,
        fonts: &'f FontBook,
    ) -> Result<Self, SurfaceError> {
        Self::with_limit(width, height, background, fonts, DEFAULT_MAX_PIXELS)
    }

    pub fn with_limit(
        width: u32,
        height: u32,
        background: Color,
        fonts: &'f FontBook,
        max_pixels: u64,
    ) -> Result<Self, SurfaceError> {
        let (width, height) = check_pixel_budget(width as f64, height as f64, max_pixels)?;
        Ok(Self {
            canvas: RgbaImage::from_pixel(width, height, background.to_rgba()),
            fonts,
            max_pixels,
        })
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    /// Composite `pixels` scaled into `dest`, rotated `angle` degrees
    /// clockwise around `pivot`.
    fn blit(
        &mut self,
        pixels: &RgbaImage,
        dest: Rect,
        angle: f64,
        pivot: (f64, f64),
    ) -> Result<(), SurfaceError> {
        let (w, h) = check_pixel_budget(dest.width.round(), dest.height.round(), self.max_pixels)?;
        if w == 0 || h == 0 || pixels.width() == 0 || pixels.height() == 0 {
            return Ok(());
        }
        let layer: Cow<'_, RgbaImage> = if pixels.dimensions() == (w, h) {
            Cow::Borrowed(pixels)
        } else {
            Cow::Owned(imageops::resize(pixels, w, h, FilterType::Lanczos3))
        };

        if angle.rem_euclid(360.0) == 0.0 {
            imageops::overlay(
                &mut self.canvas,
                layer.as_ref(),
                dest.x.round() as i64,
                dest.y.round() as i64,
            );
            return Ok(());
        }

        let (sin, cos) = angle.to_radians().sin_cos();
        let (px, py) = pivot;
        let rotate = |x: f64, y: f64| {
            let (dx, dy) = (x - px, y - py);
            (px + dx * cos - dy * sin, py + dx * sin + dy * cos)
        };
        let corners = [
            rotate(dest.x, dest.y),
            rotate(dest.x + w as f64, dest.y),
            rotate(dest.x, dest.y + h as f64),
            rotate(dest.x + w as f64, dest.y + h as f64),
        ];
        let (cw, ch) = self.canvas.dimensions();
        let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(cw);
        let y1 = (max_y.ceil().max(0.0) as u32).min(ch);

        for y in y0..y1 {
            for x in x0..x1 {
                // Inverse rotation of the pixel center back into the layer
                let (cx, cy) = (x as f64 + 0.5 - px, y as f64 + 0.5 - py);
                let ux = px + cx * cos + cy * sin - dest.x;
                let uy = py - cx * sin + cy * cos - dest.y;
                if ux < 0.0 || uy < 0.0 || ux >= w as f64 || uy >= h as f64 {
                    continue;
                }
                let src = *layer.get_pixel(ux as u32, uy as u32);
                self.canvas.get_pixel_mut(x, y).blend(&src);
            }
        }
        Ok(())
    }

    fn line_width(&self, font: Option<&FontArc>, line: &str, style: &TextStyle, sx: f64) -> f64 {
        let size = style.font_size * sx;
        let count = line.chars().count();
        let glyphs = match font {
            Some(font) => {
                let scaled = font.as_scaled(PxScale::from(size as f32));
                let mut width = 0.0f32;
                let mut prev: Option<GlyphId> = None;
                for ch in line.chars() {
                    let id = scaled.glyph_id(ch);
                    if let Some(p) = prev {
                        width += scaled.kern(p, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width as f64
            }
            None => count as f64 * size * FALLBACK_ADVANCE,
        };
        let spacing = style.char_spacing / 1000.0 * size;
        glyphs + spacing * count.saturating_sub(1) as f64
    }
}

fn fill_rect(layer: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, color: Color) {
    if color.is_transparent() {
        return;
    }
    let (lw, lh) = layer.dimensions();
    let x0 = x.round().max(0.0) as u32;
    let y0 = y.round().max(0.0) as u32;
    let x1 = ((x + w).round().max(0.0) as u32).min(lw);
    let y1 = ((y + h).round().max(0.0) as u32).min(lh);
    let rgba = color.to_rgba();
    for yy in y0..y1 {
        for xx in x0..x1 {
            layer.get_pixel_mut(xx, yy).blend(&rgba);
        }
    }
}

fn draw_glyphs(
    layer: &mut RgbaImage,
    font: &FontArc,
    line: &str,
    origin: (f32, f32),
    scale: PxScale,
    spacing: f32,
    color: Color,
) {
    let scaled = font.as_scaled(scale);
    let (lw, lh) = layer.dimensions();
    let mut caret = point(origin.0, origin.1 + scaled.ascent());
    let mut prev: Option<GlyphId> = None;
    for ch in line.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            caret.x += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, caret);
        caret.x += scaled.h_advance(id) + spacing;
        prev = Some(id);
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + gx as i64;
            let y = bounds.min.y as i64 + gy as i64;
            if x < 0 || y < 0 || x >= lw as i64 || y >= lh as i64 {
                return;
            }
            let alpha = (color.a as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
            let src = Rgba([color.r, color.g, color.b, alpha]);
            layer.get_pixel_mut(x as u32, y as u32).blend(&src);
        });
    }
}

impl Surface for RasterSurface<'_> {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let font = self.fonts.get(&style.font_family);
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.line_width(font, line, style, 1.0))
            .fold(0.0, f64::max);
        TextMetrics {
            width,
            height: lines.len() as f64 * style.font_size * style.line_height * FONT_SIZE_MULT,
        }
    }

    fn draw_image(&mut self, op: &DrawImage<'_>) -> Result<(), SurfaceError> {
        self.blit(op.pixels, op.dest, op.angle, op.pivot)
    }

    fn draw_text(&mut self, op: &DrawText<'_>) -> Result<(), SurfaceError> {
        let (w, h) = check_pixel_budget(
            op.bounds.width.ceil(),
            op.bounds.height.ceil(),
            self.max_pixels,
        )?;
        if w == 0 || h == 0 {
            return Ok(());
        }
        let style = op.style;
        let (sx, sy) = op.scale;
        let mut layer = RgbaImage::from_pixel(w, h, style.background.to_rgba());

        let font = self.fonts.get(&style.font_family);
        if font.is_none() {
            log::debug!(
                "no font registered for '{}', drawing text box only",
                style.font_family
            );
        }
        let line_h = style.font_size * style.line_height * FONT_SIZE_MULT * sy;
        let px_scale = PxScale {
            x: (style.font_size * sx) as f32,
            y: (style.font_size * sy) as f32,
        };
        let spacing = (style.char_spacing / 1000.0 * style.font_size * sx) as f32;

        for (i, line) in op.text.split('\n').enumerate() {
            let line_w = self.line_width(font, line, style, sx);
            let x = match style.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (w as f64 - line_w) / 2.0,
                TextAlign::Right => w as f64 - line_w,
            };
            let top = i as f64 * line_h;
            if let Some(font) = font {
                draw_glyphs(
                    &mut layer,
                    font,
                    line,
                    (x as f32, top as f32),
                    px_scale,
                    spacing,
                    style.fill,
                );
                if style.bold {
                    draw_glyphs(
                        &mut layer,
                        font,
                        line,
                        (x as f32 + 1.0, top as f32),
                        px_scale,
                        spacing,
                        style.fill,
                    );
                }
            }
            if style.underline {
                let thickness = (style.font_size * sy / 15.0).max(1.0);
                let baseline = top + style.font_size * sy;
                fill_rect(&mut layer, x, baseline, line_w, thickness, style.fill);
            }
        }

        self.blit(&layer, op.bounds, op.angle, op.anchor)
    }
}
