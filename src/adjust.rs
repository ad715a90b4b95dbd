//! Adjustment pipeline for the selected image layer.
//!
//! Six named adjustments map onto pixel [`Filter`]s. The chain is rebuilt
//! from scratch on every change, never patched in place, always in this order:
//!
//! ```text
//! brightness → contrast → saturation → hue → exposure → clarity
//! ```
//!
//! An adjustment at its neutral value (0) contributes no filter at all, which
//! saves a pass and avoids rounding drift on untouched channels.
//!
//! | Adjustment | Range | Filter parameter |
//! |---|---|---|
//! | brightness | -100..=100 | `value / 100` |
//! | contrast | -100..=100 | `value / 100` |
//! | saturation | -100..=100 | factor `1 + value / 100` |
//! | hue | -180..=180 | `value / 360` of a turn |
//! | exposure | -100..=100 | gamma `1 + value / 100` on all channels |
//! | clarity | -100..=100 | fixed sharpen kernel, on whenever non-zero |
//!
//! Rendering an image layer is the pure function [`render_image`]:
//! `(source pixels, crop, filters) -> pixels`. Setting a slider only stores
//! the chain on the image after [`check_renderable`]; pixels are rendered
//! once, when the scene is flattened.

use crate::render::{Filter, SHARPEN_KERNEL};
use crate::scene::CropRect;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Source raster is empty")]
    EmptySource,
    #[error("Crop {crop:?} lies outside the {width}x{height} source")]
    CropOutOfBounds {
        crop: CropRect,
        width: u32,
        height: u32,
    },
}

/// One of the six adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Exposure,
    Clarity,
}

impl Adjustment {
    /// Every adjustment, in pipeline order.
    pub const ALL: [Adjustment; 6] = [
        Adjustment::Brightness,
        Adjustment::Contrast,
        Adjustment::Saturation,
        Adjustment::Hue,
        Adjustment::Exposure,
        Adjustment::Clarity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Adjustment::Brightness => "brightness",
            Adjustment::Contrast => "contrast",
            Adjustment::Saturation => "saturation",
            Adjustment::Hue => "hue",
            Adjustment::Exposure => "exposure",
            Adjustment::Clarity => "clarity",
        }
    }

    /// Inclusive value range.
    pub fn range(self) -> (i32, i32) {
        match self {
            Adjustment::Hue => (-180, 180),
            _ => (-100, 100),
        }
    }

    pub fn clamp(self, value: i32) -> i32 {
        let (min, max) = self.range();
        value.clamp(min, max)
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Adjustment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Adjustment::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown adjustment '{s}'"))
    }
}

/// Current adjustment values. Always within range: writes are clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentState {
    brightness: i32,
    contrast: i32,
    saturation: i32,
    hue: i32,
    exposure: i32,
    clarity: i32,
}

impl AdjustmentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, adjustment: Adjustment) -> i32 {
        match adjustment {
            Adjustment::Brightness => self.brightness,
            Adjustment::Contrast => self.contrast,
            Adjustment::Saturation => self.saturation,
            Adjustment::Hue => self.hue,
            Adjustment::Exposure => self.exposure,
            Adjustment::Clarity => self.clarity,
        }
    }

    /// Set a value, clamped to the adjustment's range. Returns the stored value.
    pub fn set(&mut self, adjustment: Adjustment, value: i32) -> i32 {
        let value = adjustment.clamp(value);
        let slot = match adjustment {
            Adjustment::Brightness => &mut self.brightness,
            Adjustment::Contrast => &mut self.contrast,
            Adjustment::Saturation => &mut self.saturation,
            Adjustment::Hue => &mut self.hue,
            Adjustment::Exposure => &mut self.exposure,
            Adjustment::Clarity => &mut self.clarity,
        };
        *slot = value;
        value
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// `(adjustment, value)` pairs in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Adjustment, i32)> + '_ {
        Adjustment::ALL.into_iter().map(|a| (a, self.get(a)))
    }
}

/// Build the filter for one adjustment, or `None` at the neutral value.
pub fn filter_for(adjustment: Adjustment, value: i32) -> Option<Filter> {
    if value == 0 {
        return None;
    }
    let v = value as f32;
    Some(match adjustment {
        Adjustment::Brightness => Filter::Brightness {
            brightness: v / 100.0,
        },
        Adjustment::Contrast => Filter::Contrast {
            contrast: v / 100.0,
        },
        Adjustment::Saturation => Filter::Saturation {
            saturation: 1.0 + v / 100.0,
        },
        Adjustment::Hue => Filter::HueRotation {
            rotation: v / 360.0,
        },
        Adjustment::Exposure => {
            let g = 1.0 + v / 100.0;
            Filter::Gamma { gamma: [g, g, g] }
        }
        Adjustment::Clarity => Filter::Convolute {
            matrix: SHARPEN_KERNEL,
        },
    })
}

/// Rebuild the whole chain from the current values.
pub fn build_chain(state: &AdjustmentState) -> Vec<Filter> {
    state.iter().filter_map(|(a, v)| filter_for(a, v)).collect()
}

/// Check that a source of `dimensions` can be rendered with `crop`, without
/// touching any pixels.
pub fn check_renderable(dimensions: (u32, u32), crop: Option<CropRect>) -> Result<(), FilterError> {
    let (width, height) = dimensions;
    if width == 0 || height == 0 {
        return Err(FilterError::EmptySource);
    }
    if let Some(c) = crop {
        let fits = c.width > 0
            && c.height > 0
            && c.x.checked_add(c.width).is_some_and(|r| r <= width)
            && c.y.checked_add(c.height).is_some_and(|b| b <= height);
        if !fits {
            return Err(FilterError::CropOutOfBounds {
                crop: c,
                width,
                height,
            });
        }
    }
    Ok(())
}

/// Render an image layer: crop the source, then run the filter chain.
pub fn render_image(
    source: &RgbaImage,
    crop: Option<CropRect>,
    filters: &[Filter],
) -> Result<RgbaImage, FilterError> {
    check_renderable(source.dimensions(), crop)?;
    let mut pixels = match crop {
        Some(c) => image::imageops::crop_imm(source, c.x, c.y, c.width, c.height).to_image(),
        None => source.clone(),
    };
    crate::render::filters::apply_chain(&mut pixels, filters);
    Ok(pixels)
}
