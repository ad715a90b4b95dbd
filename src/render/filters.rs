//! Pixel filters applied to image layers.
//!
//! Each [`Filter`] is plain data stored on the image object (and therefore in
//! snapshots); [`Filter::apply`] does the pixel work. All filters operate on
//! RGB and leave alpha untouched. Results are clamped to `0..=255`.
//!
//! | Filter | Parameter | Per-channel math |
//! |---|---|---|
//! | Brightness | `b` in [-1, 1] | `c + round(255 b)` |
//! | Contrast | `k` in [-1, 1] | `f (c - 128) + 128`, `f = 259 (255k + 255) / (255 (259 - 255k))` |
//! | Saturation | factor `s` (1 = identity) | `l + (c - l) s`, `l` = Rec. 601 luma |
//! | Hue rotation | turns `t` | luminance-preserving RGB rotation by `2 pi t` |
//! | Gamma | `[gr, gg, gb]` | `255 (c / 255)^(1 / g)` |
//! | Convolute | 3x3 kernel | weighted neighbour sum, edges clamped |

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Sharpening kernel used by the clarity adjustment.
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Brightness { brightness: f32 },
    Contrast { contrast: f32 },
    Saturation { saturation: f32 },
    HueRotation { rotation: f32 },
    Gamma { gamma: [f32; 3] },
    Convolute { matrix: [f32; 9] },
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Brightness { .. } => "brightness",
            Filter::Contrast { .. } => "contrast",
            Filter::Saturation { .. } => "saturation",
            Filter::HueRotation { .. } => "hue_rotation",
            Filter::Gamma { .. } => "gamma",
            Filter::Convolute { .. } => "convolute",
        }
    }

    /// Apply the filter in place.
    pub fn apply(&self, img: &mut RgbaImage) {
        match *self {
            Filter::Brightness { brightness } => {
                let delta = (brightness * 255.0).round();
                map_rgb(img, |c| c + delta);
            }
            Filter::Contrast { contrast } => {
                let k = contrast * 255.0;
                let factor = 259.0 * (k + 255.0) / (255.0 * (259.0 - k));
                map_rgb(img, |c| factor * (c - 128.0) + 128.0);
            }
            Filter::Saturation { saturation } => saturate(img, saturation),
            Filter::HueRotation { rotation } => rotate_hue(img, rotation),
            Filter::Gamma { gamma } => apply_gamma(img, gamma),
            Filter::Convolute { matrix } => convolve3(img, &matrix),
        }
    }
}

/// Apply a chain of filters in order.
pub fn apply_chain(img: &mut RgbaImage, filters: &[Filter]) {
    for filter in filters {
        filter.apply(img);
    }
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn map_rgb(img: &mut RgbaImage, f: impl Fn(f32) -> f32) {
    for px in img.pixels_mut() {
        for c in &mut px.0[..3] {
            *c = clamp_u8(f(*c as f32));
        }
    }
}

fn saturate(img: &mut RgbaImage, factor: f32) {
    for px in img.pixels_mut() {
        let [r, g, b, _] = px.0.map(|c| c as f32);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        px.0[0] = clamp_u8(luma + (r - luma) * factor);
        px.0[1] = clamp_u8(luma + (g - luma) * factor);
        px.0[2] = clamp_u8(luma + (b - luma) * factor);
    }
}

/// Luminance-preserving hue rotation matrix for `turns` of a full circle.
fn hue_matrix(turns: f32) -> [[f32; 3]; 3] {
    let rad = turns * std::f32::consts::TAU;
    let (sin, cos) = rad.sin_cos();
    let third: f32 = 1.0 / 3.0;
    let sqrt_third_sin = third.sqrt() * sin;
    let one_minus_cos = 1.0 - cos;
    let diag = cos + one_minus_cos * third;
    let plus = third * one_minus_cos + sqrt_third_sin;
    let minus = third * one_minus_cos - sqrt_third_sin;
    [[diag, minus, plus], [plus, diag, minus], [minus, plus, diag]]
}

fn rotate_hue(img: &mut RgbaImage, turns: f32) {
    let m = hue_matrix(turns);
    for px in img.pixels_mut() {
        let [r, g, b, _] = px.0.map(|c| c as f32);
        for (i, row) in m.iter().enumerate() {
            px.0[i] = clamp_u8(row[0] * r + row[1] * g + row[2] * b);
        }
    }
}

fn apply_gamma(img: &mut RgbaImage, gamma: [f32; 3]) {
    // One lookup table per channel
    let tables: Vec<[u8; 256]> = gamma
        .iter()
        .map(|&g| {
            let inv = 1.0 / g.max(f32::EPSILON);
            let mut table = [0u8; 256];
            for (i, slot) in table.iter_mut().enumerate() {
                *slot = clamp_u8(255.0 * (i as f32 / 255.0).powf(inv));
            }
            table
        })
        .collect();
    for px in img.pixels_mut() {
        for (c, table) in px.0[..3].iter_mut().zip(&tables) {
            *c = table[*c as usize];
        }
    }
}

fn convolve3(img: &mut RgbaImage, kernel: &[f32; 9]) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let source = img.clone();
    let max_x = w as i64 - 1;
    let max_y = h as i64 - 1;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for ky in 0..3i64 {
                for kx in 0..3i64 {
                    let weight = kernel[(ky * 3 + kx) as usize];
                    if weight == 0.0 {
                        continue;
                    }
                    let sx = (x as i64 + kx - 1).clamp(0, max_x) as u32;
                    let sy = (y as i64 + ky - 1).clamp(0, max_y) as u32;
                    let sample = source.get_pixel(sx, sy).0;
                    for (a, s) in acc.iter_mut().zip(sample) {
                        *a += weight * s as f32;
                    }
                }
            }
            let px = img.get_pixel_mut(x, y);
            for (c, a) in px.0[..3].iter_mut().zip(acc) {
                *c = clamp_u8(a);
            }
        }
    }
}
