//! Parameter types for draw operations.
//!
//! These structs describe *what* to draw, not *how*. They are the interface
//! between the [`compose`](crate::compose) module (which decides where every
//! object lands on the output) and a [`Surface`](super::Surface) (which does
//! the actual pixel work). Keeping them separate lets tests swap in a
//! recording surface without changing any layout logic.
//!
//! ## Types
//!
//! - [`Color`]: RGBA color, parsed from `#rgb`, `#rrggbb`, or `transparent`.
//! - [`Rect`]: Axis-aligned rectangle in surface or scene coordinates.
//! - [`DrawImage`]: A raster placed into a destination box, optionally rotated.
//! - [`DrawText`]: A text block with its style, scale, and anchor.

use crate::scene::TextStyle;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid color '{0}': expected #rgb, #rrggbb, or transparent")]
pub struct ColorParseError(pub String);

/// An 8-bit RGBA color.
///
/// Serialized as a CSS-style hex string so snapshots and config files stay
/// readable. Fully transparent colors serialize as `transparent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Color::TRANSPARENT);
        }
        let err = || ColorParseError(s.to_string());
        let hex = trimmed.strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| err())
        };
        match hex.len() {
            3 => {
                // #abc expands to #aabbcc
                let expand = |i: usize| channel(i..i + 1).map(|v| v * 17);
                Ok(Color::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transparent() {
            f.write_str("transparent")
        } else {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Place a raster into `dest` (surface pixels), rotated by `angle` degrees
/// around `pivot`.
#[derive(Debug, Clone, Copy)]
pub struct DrawImage<'a> {
    pub pixels: &'a RgbaImage,
    pub dest: Rect,
    pub angle: f64,
    pub pivot: (f64, f64),
}

/// Draw a text block.
///
/// `bounds` is the unrotated box in surface pixels; `scale` is the combined
/// object scale and output multiplier applied to the style's font size.
/// `anchor` is the object's own position (its origin point) on the surface.
#[derive(Debug, Clone, Copy)]
pub struct DrawText<'a> {
    pub text: &'a str,
    pub style: &'a TextStyle,
    pub bounds: Rect,
    pub scale: (f64, f64),
    pub angle: f64,
    pub anchor: (f64, f64),
}

/// Size of a laid-out text block at scale 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}
