//! Editor configuration module.
//!
//! Handles loading, validating, and merging `editor.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [canvas]
//! width = 800               # Editing canvas size in pixels
//! height = 600
//! background = "#ffffff"    # Canvas fill for previews (exports stay transparent)
//! fit = 0.8                 # Share of the canvas a new image is fitted into
//!
//! [text]
//! content = "Double click to edit"
//! font_family = "Arial"
//! font_size = 40
//! fill = "#000000"
//!
//! [sticker]
//! font_family = "Arial"
//! font_size = 60
//!
//! [export]
//! multiplier = 2            # Output size relative to the displayed base image
//! file_prefix = "clickin-export"
//! max_pixels = 100000000    # Largest output raster (width x height) ever allocated
//!
//! [caption]
//! base_url = "https://clickin-fastapi.onrender.com"
//! timeout_secs = 60
//!
//! [history]
//! # limit = 50              # Max snapshots kept (omit for unbounded)
//!
//! [fonts]
//! # Arial = "fonts/Arial.ttf"   # Family -> font file, relative to this file
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::render::{Color, DEFAULT_MAX_PIXELS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "editor.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Editor configuration loaded from `editor.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub canvas: CanvasConfig,
    /// Defaults for new text layers.
    pub text: TextConfig,
    pub sticker: StickerConfig,
    pub export: ExportConfig,
    pub caption: CaptionConfig,
    pub history: HistoryConfig,
    /// Font files by family name. Families not listed here render without glyphs.
    pub fonts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub fit: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: Color::WHITE,
            fit: 0.8,
        }
    }
}

impl CanvasConfig {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    pub content: String,
    pub font_family: String,
    pub font_size: f64,
    pub fill: Color,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            content: "Double click to edit".to_string(),
            font_family: "Arial".to_string(),
            font_size: 40.0,
            fill: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StickerConfig {
    pub font_family: String,
    pub font_size: f64,
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub multiplier: f64,
    pub file_prefix: String,
    /// Largest raster, in pixels, any render may allocate.
    pub max_pixels: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            file_prefix: "clickin-export".to_string(),
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://clickin-fastapi.onrender.com".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Maximum snapshots kept. `None` keeps every snapshot.
    pub limit: Option<usize>,
}

/// Text sizes the text panel accepts.
pub const FONT_SIZE_RANGE: (f64, f64) = (8.0, 200.0);

impl EditorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("canvas.fit", self.canvas.fit),
            ("text.font_size", self.text.font_size),
            ("sticker.font_size", self.sticker.font_size),
            ("export.multiplier", self.export.multiplier),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a finite number"
                )));
            }
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Validation(
                "canvas.width and canvas.height must be non-zero".into(),
            ));
        }
        if !(self.canvas.fit > 0.0 && self.canvas.fit <= 1.0) {
            return Err(ConfigError::Validation(
                "canvas.fit must be in (0, 1]".into(),
            ));
        }
        let (min, max) = FONT_SIZE_RANGE;
        if !(min..=max).contains(&self.text.font_size) {
            return Err(ConfigError::Validation(format!(
                "text.font_size must be {min}-{max}"
            )));
        }
        if self.sticker.font_size <= 0.0 {
            return Err(ConfigError::Validation(
                "sticker.font_size must be positive".into(),
            ));
        }
        if !(self.export.multiplier > 0.0 && self.export.multiplier <= 8.0) {
            return Err(ConfigError::Validation(
                "export.multiplier must be in (0, 8]".into(),
            ));
        }
        let canvas_pixels = self.canvas.width as u64 * self.canvas.height as u64;
        if canvas_pixels > self.export.max_pixels {
            return Err(ConfigError::Validation(format!(
                "export.max_pixels must be at least the canvas area ({canvas_pixels})"
            )));
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "export.file_prefix must not be empty".into(),
            ));
        }
        if !(self.caption.base_url.starts_with("http://")
            || self.caption.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "caption.base_url must be an http(s) URL".into(),
            ));
        }
        if self.caption.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "caption.timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EditorConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EditorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EditorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        log::debug!("loaded config from {}", path.display());
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `editor.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Clickin Editor Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Editing canvas
# ---------------------------------------------------------------------------
[canvas]
# Canvas size in pixels. New images are fitted and centered inside it.
width = 800
height = 600

# Canvas fill used for previews. Exports are always transparent outside
# the drawn objects.
background = "#ffffff"

# Share of the canvas (per axis) a newly added image is scaled to fit.
fit = 0.8

# ---------------------------------------------------------------------------
# New text layers
# ---------------------------------------------------------------------------
[text]
content = "Double click to edit"
font_family = "Arial"
# Font size in pixels (8-200).
font_size = 40
fill = "#000000"

# ---------------------------------------------------------------------------
# Emoji stickers
# ---------------------------------------------------------------------------
[sticker]
font_family = "Arial"
font_size = 60

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Output size relative to the displayed base image (2 = twice the size).
multiplier = 2

# Exported files are named <file_prefix>-<unix millis>.png
file_prefix = "clickin-export"

# Largest raster (width x height) a render may allocate. Exports or layers
# scaled past this fail with an error instead of exhausting memory.
max_pixels = 100000000

# ---------------------------------------------------------------------------
# AI caption service
# ---------------------------------------------------------------------------
[caption]
base_url = "https://clickin-fastapi.onrender.com"
timeout_secs = 60

# ---------------------------------------------------------------------------
# Undo history
# ---------------------------------------------------------------------------
[history]
# Maximum snapshots kept. Omit for unbounded.
# limit = 50

# ---------------------------------------------------------------------------
# Fonts
# ---------------------------------------------------------------------------
[fonts]
# Map font families to TTF/OTF files (relative to this config file).
# Text in families without a font file is laid out but drawn without glyphs.
# Arial = "fonts/Arial.ttf"
"##
}
