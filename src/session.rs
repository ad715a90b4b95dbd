//! Editing session: the single owner of all editor state.
//!
//! Every user action is an intent method on [`Session`]. An intent validates
//! its preconditions, mutates the scene and layer registry together, and ends
//! by recording a history snapshot. Missing preconditions (nothing selected,
//! no image loaded, an id that no longer exists) make an intent a silent
//! no-op reported through its return value, never an error.
//!
//! ## What a snapshot holds
//!
//! A snapshot is the JSON of the scene objects plus the layer registry.
//! Decoded pixels live in the session's [`SourceStore`] and are referenced by
//! content hash, so restoring never re-decodes. The selection, adjustment
//! slider values, and any in-progress crop are interaction state and are not
//! part of it.
//!
//! ## Intents that do not snapshot
//!
//! `undo`/`redo` (they restore one), `select`, `start_crop`, `cancel_crop`,
//! `set_crop_region`, and the read-only export and caption operations.

use crate::adjust::{Adjustment, AdjustmentState, build_chain, check_renderable};
use crate::caption::{CaptionError, CaptionKind, CaptionService};
use crate::compose::{self, ComposeError};
use crate::config::{EditorConfig, FONT_SIZE_RANGE};
use crate::history::{History, now_millis};
use crate::ingest::{self, Decoded, IngestError, SourceStore};
use crate::layers::{LayerEntry, LayerKind, LayerRegistry};
use crate::render::{
    Color, FontBook, Rect, bounding_box, centered_position, crop_from_region, displayed_size,
    fit_scale,
};
use crate::scene::{
    CropRect, ImageObject, ObjectId, ObjectKind, Placement, Scene, StickerObject, TextAlign,
    TextObject, TextStyle,
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Character spacing range, in thousandths of an em.
pub const CHAR_SPACING_RANGE: (f64, f64) = (-200.0, 800.0);
pub const LINE_HEIGHT_RANGE: (f64, f64) = (0.5, 2.5);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not load image: {0}")]
    Decode(#[from] IngestError),
    #[error("Compositing failed: {0}")]
    Compose(#[from] ComposeError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Text panel edits. Unset fields are left alone; numeric values are clamped
/// to what the panel allows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextEdit {
    pub content: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub fill: Option<Color>,
    /// `transparent` removes the background.
    pub background: Option<Color>,
    pub char_spacing: Option<f64>,
    pub line_height: Option<f64>,
    pub align: Option<TextAlign>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
}

/// Move, scale, or rotate an object. Unset and non-finite fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Transform {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    /// Degrees, clockwise.
    pub angle: Option<f64>,
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub file_name: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Image attributes captured when cropping starts.
#[derive(Debug, Clone, Copy)]
struct CropBaseline {
    placement: Placement,
    width: u32,
    height: u32,
    crop: Option<CropRect>,
}

#[derive(Debug, Clone, Copy)]
struct CropSession {
    target: ObjectId,
    baseline: CropBaseline,
    region: Rect,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    scene: &'a Scene,
    layers: &'a LayerRegistry,
}

#[derive(Deserialize)]
struct Document {
    scene: Scene,
    layers: LayerRegistry,
}

pub struct Session {
    config: EditorConfig,
    fonts: FontBook,
    scene: Scene,
    layers: LayerRegistry,
    history: History,
    adjustments: AdjustmentState,
    sources: SourceStore,
    crop: Option<CropSession>,
}

impl Session {
    /// New session without any loaded fonts.
    pub fn new(config: EditorConfig) -> Result<Self, SessionError> {
        Self::with_fonts(config, FontBook::new())
    }

    /// New session. Records a baseline snapshot of the empty document so the
    /// first action can be undone.
    pub fn with_fonts(config: EditorConfig, fonts: FontBook) -> Result<Self, SessionError> {
        let history = History::with_limit(config.history.limit);
        let mut session = Self {
            config,
            fonts,
            scene: Scene::new(),
            layers: LayerRegistry::new(),
            history,
            adjustments: AdjustmentState::new(),
            sources: SourceStore::new(),
            crop: None,
        };
        session.snapshot()?;
        Ok(session)
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn adjustments(&self) -> &AdjustmentState {
        &self.adjustments
    }

    pub fn sources(&self) -> &SourceStore {
        &self.sources
    }

    pub fn active_id(&self) -> Option<ObjectId> {
        self.scene.active_id()
    }

    /// The crop region being edited, if cropping is in progress.
    pub fn crop_region(&self) -> Option<Rect> {
        self.crop.map(|c| c.region)
    }

    // =========================================================================
    // Adding objects
    // =========================================================================

    /// Decode and add an image, fitted into the canvas and centered.
    ///
    /// The image goes to the bottom of the stack and becomes the base image.
    pub fn add_image(&mut self, bytes: &[u8]) -> Result<ObjectId, SessionError> {
        let decoded = ingest::decode(bytes)?;
        self.insert_image(decoded)
    }

    /// Add several images. They are decoded in parallel and inserted in input
    /// order; one failure does not stop the others.
    pub fn add_images<B: AsRef<[u8]> + Sync>(
        &mut self,
        batch: &[B],
    ) -> Vec<Result<ObjectId, SessionError>> {
        ingest::decode_many(batch)
            .into_iter()
            .map(|decoded| {
                let decoded = decoded.inspect_err(|e| log::warn!("skipping image: {e}"))?;
                self.insert_image(decoded)
            })
            .collect()
    }

    fn insert_image(&mut self, decoded: Decoded) -> Result<ObjectId, SessionError> {
        let (width, height) = decoded.dimensions();
        let source = self.sources.insert(decoded);
        let canvas = self.config.canvas.size();
        let scale = fit_scale(canvas, (width, height), self.config.canvas.fit);
        let (left, top) = centered_position(canvas, (width as f64 * scale, height as f64 * scale));
        let id = self.scene.insert(
            ObjectKind::Image(ImageObject {
                source,
                width,
                height,
                crop: None,
                filters: Vec::new(),
            }),
            Placement::at(left, top).with_scale(scale),
        );
        log::info!("added image {id} ({width}x{height}, scale {scale:.3})");
        self.finish_insert(id, LayerKind::Image)?;
        Ok(id)
    }

    /// Add a text layer with the configured defaults, centered on the canvas.
    pub fn add_text(&mut self) -> Result<ObjectId, SessionError> {
        let defaults = &self.config.text;
        let style = TextStyle::new(
            defaults.font_family.clone(),
            defaults.font_size,
            defaults.fill,
        );
        let kind = ObjectKind::Text(TextObject {
            content: defaults.content.clone(),
            style,
        });
        let id = self.scene.insert(kind, self.canvas_center());
        log::info!("added text {id}");
        self.finish_insert(id, LayerKind::Text)?;
        Ok(id)
    }

    /// Add an emoji sticker, centered on the canvas.
    pub fn add_sticker(&mut self, glyph: &str) -> Result<ObjectId, SessionError> {
        let style = TextStyle::new(
            self.config.sticker.font_family.clone(),
            self.config.sticker.font_size,
            Color::BLACK,
        );
        let kind = ObjectKind::Sticker(StickerObject {
            glyph: glyph.to_string(),
            style,
        });
        let id = self.scene.insert(kind, self.canvas_center());
        log::info!("added sticker {id} '{glyph}'");
        self.finish_insert(id, LayerKind::Sticker)?;
        Ok(id)
    }

    fn canvas_center(&self) -> Placement {
        let (w, h) = self.config.canvas.size();
        Placement::centered(w as f64 / 2.0, h as f64 / 2.0)
    }

    fn finish_insert(&mut self, id: ObjectId, kind: LayerKind) -> Result<(), SessionError> {
        self.scene.select(id);
        self.layers.add(LayerEntry::new(id, kind));
        self.snapshot()
    }

    // =========================================================================
    // Selection and removal
    // =========================================================================

    /// Select an object. Returns `false` if it does not exist.
    pub fn select(&mut self, id: ObjectId) -> bool {
        self.scene.select(id)
    }

    pub fn clear_selection(&mut self) {
        self.scene.clear_selection();
    }

    /// Remove the selected object.
    ///
    /// Removing an image clears the whole document: text and stickers are
    /// positioned against the image and make no sense without it.
    pub fn remove_active(&mut self) -> Result<bool, SessionError> {
        let Some(active) = self.scene.active() else {
            return Ok(false);
        };
        let id = active.id;
        if active.kind.is_image() {
            let removed = self.scene.clear();
            self.layers.clear();
            self.crop = None;
            log::info!("removed image {id}, cleared {} objects", removed.len());
        } else {
            self.scene.remove(id);
            self.layers.remove(id);
            if self.crop.is_some_and(|c| c.target == id) {
                self.crop = None;
            }
            log::info!("removed {id}");
        }
        self.snapshot()?;
        Ok(true)
    }

    // =========================================================================
    // Editing objects
    // =========================================================================

    /// Apply text panel edits to a text object. Stickers are not editable.
    pub fn update_text(&mut self, id: ObjectId, edit: &TextEdit) -> Result<bool, SessionError> {
        let Some(object) = self.scene.get_mut(id) else {
            return Ok(false);
        };
        let ObjectKind::Text(text) = &mut object.kind else {
            return Ok(false);
        };
        apply_text_edit(text, edit);
        log::info!("edited text {id}");
        self.snapshot()?;
        Ok(true)
    }

    /// Move, scale, or rotate an object.
    pub fn transform(&mut self, id: ObjectId, change: &Transform) -> Result<bool, SessionError> {
        let Some(object) = self.scene.get_mut(id) else {
            return Ok(false);
        };
        let p = &mut object.placement;
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        let positive = |v: Option<f64>| finite(v).filter(|v| *v > 0.0);
        if let Some(left) = finite(change.left) {
            p.left = left;
        }
        if let Some(top) = finite(change.top) {
            p.top = top;
        }
        if let Some(sx) = positive(change.scale_x) {
            p.scale_x = sx;
        }
        if let Some(sy) = positive(change.scale_y) {
            p.scale_y = sy;
        }
        if let Some(angle) = finite(change.angle) {
            p.angle = angle.rem_euclid(360.0);
        }
        log::info!("transformed {id}");
        self.snapshot()?;
        Ok(true)
    }

    /// Flip a layer's visibility. Returns the new visibility, or `None` for an
    /// unknown layer.
    pub fn toggle_layer_visibility(&mut self, id: ObjectId) -> Result<Option<bool>, SessionError> {
        let Some(visible) = self.layers.toggle_visibility(id, &mut self.scene) else {
            return Ok(None);
        };
        log::info!("layer {id} visible={visible}");
        self.snapshot()?;
        Ok(Some(visible))
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    /// Set one adjustment and re-apply the chain to the selected image.
    ///
    /// The value is stored (clamped) even when nothing can be applied.
    /// Returns whether the selected image was updated.
    pub fn set_adjustment(
        &mut self,
        adjustment: Adjustment,
        value: i32,
    ) -> Result<bool, SessionError> {
        let stored = self.adjustments.set(adjustment, value);
        log::debug!("{adjustment} = {stored}");
        self.apply_adjustments()
    }

    /// Zero every adjustment and clear the selected image's filters.
    pub fn reset_adjustments(&mut self) -> Result<bool, SessionError> {
        self.adjustments.reset();
        self.apply_adjustments()
    }

    fn apply_adjustments(&mut self) -> Result<bool, SessionError> {
        let Some(object) = self.scene.active() else {
            return Ok(false);
        };
        let id = object.id;
        let Some(image) = object.as_image() else {
            return Ok(false);
        };
        let Some(source) = self.sources.get(&image.source) else {
            log::warn!("no pixels loaded for {id}, adjustment not applied");
            return Ok(false);
        };
        let chain = build_chain(&self.adjustments);
        if let Err(e) = check_renderable(source.dimensions(), image.crop) {
            log::error!("applying filters to {id} failed: {e}");
            return Ok(false);
        }
        if let Some(image) = self.scene.get_mut(id).and_then(|o| o.as_image_mut()) {
            log::info!("applied {} filters to {id}", chain.len());
            image.filters = chain;
        }
        self.snapshot()?;
        Ok(true)
    }

    // =========================================================================
    // Cropping
    // =========================================================================

    /// Begin cropping the selected image with a region covering all of it.
    pub fn start_crop(&mut self) -> bool {
        let Some(object) = self.scene.active() else {
            return false;
        };
        let Some(image) = object.as_image() else {
            return false;
        };
        let baseline = CropBaseline {
            placement: object.placement,
            width: image.width,
            height: image.height,
            crop: image.crop,
        };
        let size = displayed_size((image.width as f64, image.height as f64), &object.placement);
        let region = bounding_box(&object.placement, size);
        log::info!("cropping {}", object.id);
        self.crop = Some(CropSession {
            target: object.id,
            baseline,
            region,
        });
        true
    }

    /// Move or resize the crop region (scene coordinates).
    pub fn set_crop_region(&mut self, region: Rect) -> bool {
        let valid = [region.x, region.y, region.width, region.height]
            .iter()
            .all(|v| v.is_finite())
            && region.width > 0.0
            && region.height > 0.0;
        match &mut self.crop {
            Some(crop) if valid => {
                crop.region = region;
                true
            }
            _ => false,
        }
    }

    /// Commit the crop region to the image.
    ///
    /// The region is converted to source pixels with the scale captured at
    /// crop start. The image keeps its position and scale; its intrinsic size
    /// becomes the crop size.
    pub fn apply_crop(&mut self) -> Result<bool, SessionError> {
        let Some(crop) = self.crop.take() else {
            return Ok(false);
        };
        let Some(object) = self.scene.get(crop.target) else {
            return Ok(false);
        };
        let Some(image) = object.as_image() else {
            return Ok(false);
        };
        let Some(source) = self.sources.get(&image.source) else {
            log::warn!("no pixels loaded for {}, crop discarded", crop.target);
            return Ok(false);
        };
        let base = crop.baseline;
        let size = displayed_size((base.width as f64, base.height as f64), &base.placement);
        let origin = bounding_box(&base.placement, size);
        let Some(rect) = crop_from_region(
            crop.region,
            (origin.x, origin.y),
            (base.placement.scale_x, base.placement.scale_y),
            base.crop,
            source.dimensions(),
        ) else {
            log::warn!("crop region misses {}, nothing cropped", crop.target);
            self.crop = Some(crop);
            return Ok(false);
        };
        if let Some(image) = self.scene.get_mut(crop.target).and_then(|o| o.as_image_mut()) {
            image.crop = Some(rect);
            image.width = rect.width;
            image.height = rect.height;
        }
        self.scene.select(crop.target);
        log::info!(
            "cropped {} to {}x{} at ({}, {})",
            crop.target,
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        self.snapshot()?;
        Ok(true)
    }

    /// Abandon cropping and put back the image's pre-crop attributes.
    pub fn cancel_crop(&mut self) -> bool {
        let Some(crop) = self.crop.take() else {
            return false;
        };
        if let Some(object) = self.scene.get_mut(crop.target) {
            object.placement = crop.baseline.placement;
            if let Some(image) = object.as_image_mut() {
                image.width = crop.baseline.width;
                image.height = crop.baseline.height;
                image.crop = crop.baseline.crop;
            }
        }
        log::info!("crop of {} cancelled", crop.target);
        true
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Restore the previous snapshot. Returns `false` at the oldest one.
    ///
    /// A snapshot that fails to load leaves the document and the history
    /// cursor where they were.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        let Some(snapshot) = self.history.previous() else {
            return Ok(false);
        };
        let document: Document = serde_json::from_str(&snapshot.json)?;
        self.history.undo();
        self.restore(document);
        log::info!("undo");
        Ok(true)
    }

    /// Restore the next snapshot. Returns `false` at the newest one.
    pub fn redo(&mut self) -> Result<bool, SessionError> {
        let Some(snapshot) = self.history.following() else {
            return Ok(false);
        };
        let document: Document = serde_json::from_str(&snapshot.json)?;
        self.history.redo();
        self.restore(document);
        log::info!("redo");
        Ok(true)
    }

    fn snapshot(&mut self) -> Result<(), SessionError> {
        let json = serde_json::to_string(&DocumentRef {
            scene: &self.scene,
            layers: &self.layers,
        })?;
        log::debug!("snapshot {} ({} bytes)", self.history.len(), json.len());
        self.history.save(json);
        Ok(())
    }

    fn restore(&mut self, document: Document) {
        self.scene.restore(document.scene);
        self.layers = document.layers;
        self.crop = None;
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Flatten the document at the export multiplier and encode it as PNG.
    ///
    /// Returns `None` when there is no base image.
    pub fn export(&self) -> Result<Option<ExportedImage>, SessionError> {
        let Some(png) = self.render_png(self.config.export.multiplier)? else {
            return Ok(None);
        };
        let (png, (width, height)) = png;
        let file_name = format!("{}-{}.png", self.config.export.file_prefix, now_millis());
        log::info!("exported {file_name} ({width}x{height})");
        Ok(Some(ExportedImage {
            file_name,
            png,
            width,
            height,
        }))
    }

    /// PNG at the displayed size, as uploaded for captioning.
    pub fn caption_png(&self) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.render_png(1.0)?.map(|(png, _)| png))
    }

    fn render_png(&self, multiplier: f64) -> Result<Option<(Vec<u8>, (u32, u32))>, SessionError> {
        let Some(raster) = compose::flatten(
            &self.scene,
            &self.sources,
            &self.fonts,
            multiplier,
            self.config.export.max_pixels,
        )?
        else {
            return Ok(None);
        };
        let png = compose::encode_png(&raster)?;
        Ok(Some((png, raster.dimensions())))
    }

    /// The editing canvas as currently displayed, background included.
    pub fn render_preview(&self) -> Result<RgbaImage, SessionError> {
        Ok(compose::render_canvas(
            &self.scene,
            &self.sources,
            &self.fonts,
            self.config.canvas.size(),
            self.config.canvas.background,
            self.config.export.max_pixels,
        )?)
    }

    /// Export the document and ask `service` for generated text.
    ///
    /// Editor state is never touched, whatever the outcome.
    pub fn generate_caption<S: CaptionService + ?Sized>(
        &self,
        service: &S,
        kind: CaptionKind,
    ) -> Result<String, CaptionError> {
        if self.scene.base_image().is_none() {
            return Err(CaptionError::NoImage);
        }
        let png = match self.caption_png() {
            Ok(Some(png)) => png,
            Ok(None) => return Err(CaptionError::NoImage),
            Err(e) => {
                log::error!("caption export failed: {e}");
                return Err(CaptionError::ExportFailed);
            }
        };
        service.generate(kind, &png)
    }
}

fn apply_text_edit(text: &mut TextObject, edit: &TextEdit) {
    let style = &mut text.style;
    if let Some(content) = &edit.content {
        text.content = content.clone();
    }
    if let Some(family) = &edit.font_family {
        style.font_family = family.clone();
    }
    if let Some(size) = edit.font_size.filter(|v| v.is_finite()) {
        style.font_size = size.clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
    }
    if let Some(fill) = edit.fill {
        style.fill = fill;
    }
    if let Some(background) = edit.background {
        style.background = background;
    }
    if let Some(spacing) = edit.char_spacing.filter(|v| v.is_finite()) {
        style.char_spacing = spacing.clamp(CHAR_SPACING_RANGE.0, CHAR_SPACING_RANGE.1);
    }
    if let Some(line_height) = edit.line_height.filter(|v| v.is_finite()) {
        style.line_height = line_height.clamp(LINE_HEIGHT_RANGE.0, LINE_HEIGHT_RANGE.1);
    }
    if let Some(align) = edit.align {
        style.align = align;
    }
    if let Some(bold) = edit.bold {
        style.bold = bold;
    }
    if let Some(italic) = edit.italic {
        style.italic = italic;
    }
    if let Some(underline) = edit.underline {
        style.underline = underline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::tests::MockCaptionService;
    use crate::render::Filter;
    use crate::test_helpers::{png_bytes, session, session_with};

    fn ids(session: &Session) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = session.scene().objects().iter().map(|o| o.id).collect();
        ids.sort();
        ids
    }

    fn registry_ids(session: &Session) -> Vec<ObjectId> {
        let mut ids = session.layers().ids();
        ids.sort();
        ids
    }

    // =========================================================================
    // Adding objects
    // =========================================================================

    #[test]
    fn new_session_has_baseline_snapshot() {
        let s = session();
        assert_eq!(s.history().len(), 1);
        assert!(!s.history().can_undo());
    }

    #[test]
    fn add_image_fits_and_centers() {
        let mut s = session();
        let id = s.add_image(&png_bytes(1600, 1200, [255, 0, 0, 255])).unwrap();
        let object = s.scene().get(id).unwrap();
        assert_eq!(object.placement.scale_x, 0.4);
        assert_eq!(object.placement.left, 80.0);
        assert_eq!(object.placement.top, 60.0);
        assert_eq!(s.active_id(), Some(id));
        assert_eq!(s.layers().get(id).unwrap().name, "Image Layer");
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn add_image_decode_failure_leaves_state_unchanged() {
        let mut s = session();
        let err = s.add_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
        assert!(s.scene().is_empty());
        assert!(s.layers().is_empty());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn add_images_inserts_good_files_in_order() {
        let mut s = session();
        let batch: Vec<Vec<u8>> = vec![
            png_bytes(10, 10, [1, 0, 0, 255]),
            b"junk".to_vec(),
            png_bytes(20, 10, [2, 0, 0, 255]),
        ];
        let results = s.add_images(&batch);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        let last = *results[2].as_ref().unwrap();
        assert_eq!(s.scene().len(), 2);
        // Last inserted image is the base
        assert_eq!(s.scene().base_image().map(|o| o.id), Some(last));
    }

    #[test]
    fn add_text_uses_configured_defaults() {
        let mut s = session();
        let id = s.add_text().unwrap();
        let object = s.scene().get(id).unwrap();
        let ObjectKind::Text(text) = &object.kind else {
            panic!("expected text");
        };
        assert_eq!(text.content, "Double click to edit");
        assert_eq!(text.style.font_family, "Arial");
        assert_eq!(text.style.font_size, 40.0);
        assert_eq!(text.style.fill, Color::BLACK);
        assert_eq!(object.placement, Placement::centered(400.0, 300.0));
        assert_eq!(s.layers().get(id).unwrap().name, "Text Layer");
    }

    #[test]
    fn add_sticker_is_large_and_on_top() {
        let mut s = session();
        let sticker = s.add_sticker("🔥").unwrap();
        s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        let top = s.scene().objects().last().unwrap();
        assert_eq!(top.id, sticker);
        let ObjectKind::Sticker(st) = &top.kind else {
            panic!("expected sticker");
        };
        assert_eq!(st.style.font_size, 60.0);
        assert_eq!(s.layers().get(sticker).unwrap().name, "Sticker Layer");
    }

    // =========================================================================
    // Removal and registry consistency
    // =========================================================================

    #[test]
    fn registry_tracks_scene_through_add_and_remove() {
        let mut s = session();
        s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        let t = s.add_text().unwrap();
        s.add_sticker("⭐").unwrap();
        assert_eq!(ids(&s), registry_ids(&s));

        s.select(t);
        assert!(s.remove_active().unwrap());
        assert_eq!(ids(&s), registry_ids(&s));
        assert_eq!(s.scene().len(), 2);
    }

    #[test]
    fn removing_image_clears_everything() {
        let mut s = session();
        let img = s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        for glyph in ["😀", "🎉", "❤️"] {
            s.add_sticker(glyph).unwrap();
        }
        s.select(img);
        assert!(s.remove_active().unwrap());
        assert!(s.scene().is_empty());
        assert!(s.layers().is_empty());
    }

    #[test]
    fn remove_without_selection_is_noop() {
        let mut s = session();
        s.add_text().unwrap();
        s.clear_selection();
        let before = s.history().len();
        assert!(!s.remove_active().unwrap());
        assert_eq!(s.scene().len(), 1);
        assert_eq!(s.history().len(), before);
    }

    // =========================================================================
    // Text and transforms
    // =========================================================================

    #[test]
    fn update_text_clamps_panel_ranges() {
        let mut s = session();
        let id = s.add_text().unwrap();
        let edit = TextEdit {
            content: Some("Hello".into()),
            font_size: Some(500.0),
            char_spacing: Some(-1000.0),
            line_height: Some(9.0),
            background: Some(Color::rgb(255, 0, 0)),
            bold: Some(true),
            align: Some(TextAlign::Center),
            ..TextEdit::default()
        };
        assert!(s.update_text(id, &edit).unwrap());
        let ObjectKind::Text(text) = &s.scene().get(id).unwrap().kind else {
            panic!("expected text");
        };
        assert_eq!(text.content, "Hello");
        assert_eq!(text.style.font_size, 200.0);
        assert_eq!(text.style.char_spacing, -200.0);
        assert_eq!(text.style.line_height, 2.5);
        assert_eq!(text.style.background, Color::rgb(255, 0, 0));
        assert!(text.style.bold);
        assert_eq!(text.style.align, TextAlign::Center);
    }

    #[test]
    fn update_text_ignores_stickers_and_unknown_ids() {
        let mut s = session();
        let sticker = s.add_sticker("🔥").unwrap();
        let edit = TextEdit {
            content: Some("x".into()),
            ..TextEdit::default()
        };
        assert!(!s.update_text(sticker, &edit).unwrap());
        assert!(!s.update_text(ObjectId(999), &edit).unwrap());
    }

    #[test]
    fn transform_ignores_invalid_values() {
        let mut s = session();
        let id = s.add_text().unwrap();
        let change = Transform {
            left: Some(10.0),
            top: Some(f64::NAN),
            scale_x: Some(-2.0),
            scale_y: Some(2.0),
            angle: Some(-90.0),
        };
        assert!(s.transform(id, &change).unwrap());
        let p = s.scene().get(id).unwrap().placement;
        assert_eq!(p.left, 10.0);
        assert_eq!(p.top, 300.0);
        assert_eq!(p.scale_x, 1.0);
        assert_eq!(p.scale_y, 2.0);
        assert_eq!(p.angle, 270.0);
    }

    #[test]
    fn toggle_visibility_snapshots() {
        let mut s = session();
        let id = s.add_text().unwrap();
        assert_eq!(s.toggle_layer_visibility(id).unwrap(), Some(false));
        assert!(!s.scene().get(id).unwrap().visible);
        s.undo().unwrap();
        assert!(s.scene().get(id).unwrap().visible);
        assert!(s.layers().get(id).unwrap().visible);
        assert_eq!(s.toggle_layer_visibility(ObjectId(77)).unwrap(), None);
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    #[test]
    fn adjustment_applies_chain_to_selected_image() {
        let mut s = session();
        let id = s.add_image(&png_bytes(10, 10, [100, 100, 100, 255])).unwrap();
        assert!(s.set_adjustment(Adjustment::Brightness, 150).unwrap());
        assert_eq!(s.adjustments().get(Adjustment::Brightness), 100);
        let filters = &s.scene().get(id).unwrap().as_image().unwrap().filters;
        assert_eq!(filters, &vec![Filter::Brightness { brightness: 1.0 }]);
    }

    #[test]
    fn adjustment_without_selected_image_stores_value_only() {
        let mut s = session();
        s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        s.add_text().unwrap();
        let before = s.history().len();
        assert!(!s.set_adjustment(Adjustment::Hue, 45).unwrap());
        assert_eq!(s.adjustments().get(Adjustment::Hue), 45);
        assert_eq!(s.history().len(), before);
    }

    #[test]
    fn reset_clears_filters() {
        let mut s = session();
        let id = s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        s.set_adjustment(Adjustment::Contrast, 30).unwrap();
        s.set_adjustment(Adjustment::Clarity, 10).unwrap();
        assert!(s.reset_adjustments().unwrap());
        assert!(s.adjustments().is_neutral());
        assert!(s.scene().get(id).unwrap().as_image().unwrap().filters.is_empty());
    }

    // =========================================================================
    // Cropping
    // =========================================================================

    #[test]
    fn crop_region_starts_over_displayed_image() {
        let mut s = session();
        s.add_image(&png_bytes(400, 300, [0, 0, 0, 255])).unwrap();
        assert!(s.start_crop());
        // 400x300 fits to 640x480 at scale 1.6, centered at (80, 60)
        assert_eq!(s.crop_region(), Some(Rect::new(80.0, 60.0, 640.0, 480.0)));
    }

    #[test]
    fn apply_crop_converts_region_to_source_pixels() {
        let mut s = session();
        let id = s.add_image(&png_bytes(400, 300, [0, 0, 0, 255])).unwrap();
        s.start_crop();
        // 160 scene px at scale 1.6 = 100 source px
        assert!(s.set_crop_region(Rect::new(80.0 + 16.0, 60.0 + 32.0, 160.0, 80.0)));
        assert!(s.apply_crop().unwrap());
        let object = s.scene().get(id).unwrap();
        let image = object.as_image().unwrap();
        assert_eq!(
            image.crop,
            Some(CropRect {
                x: 10,
                y: 20,
                width: 100,
                height: 50
            })
        );
        assert_eq!((image.width, image.height), (100, 50));
        assert_eq!(object.placement.left, 80.0);
        assert!(s.crop_region().is_none());
        assert_eq!(s.active_id(), Some(id));
    }

    #[test]
    fn cancel_crop_restores_and_does_not_snapshot() {
        let mut s = session();
        let id = s.add_image(&png_bytes(400, 300, [0, 0, 0, 255])).unwrap();
        let before = s.scene().get(id).cloned();
        let history_len = s.history().len();
        s.start_crop();
        s.set_crop_region(Rect::new(100.0, 100.0, 50.0, 50.0));
        assert!(s.cancel_crop());
        assert_eq!(s.scene().get(id).cloned(), before);
        assert_eq!(s.history().len(), history_len);
        assert!(!s.apply_crop().unwrap());
    }

    #[test]
    fn crop_requires_selected_image() {
        let mut s = session();
        s.add_text().unwrap();
        assert!(!s.start_crop());
        assert!(!s.set_crop_region(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn undo_drops_crop_in_progress() {
        let mut s = session();
        s.add_image(&png_bytes(40, 30, [0, 0, 0, 255])).unwrap();
        s.start_crop();
        s.undo().unwrap();
        assert!(s.crop_region().is_none());
    }

    // =========================================================================
    // History
    // =========================================================================

    #[test]
    fn undo_on_fresh_session_changes_nothing() {
        let mut s = session();
        assert!(!s.undo().unwrap());
        assert!(s.scene().is_empty());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn undo_redo_walk_through_states() {
        let mut s = session();
        let img = s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        let text = s.add_text().unwrap();

        assert!(s.undo().unwrap());
        assert_eq!(ids(&s), vec![img]);
        assert_eq!(registry_ids(&s), vec![img]);
        assert!(s.active_id().is_none());

        assert!(s.undo().unwrap());
        assert!(s.scene().is_empty());
        assert!(!s.undo().unwrap());

        assert!(s.redo().unwrap());
        assert!(s.redo().unwrap());
        assert_eq!(ids(&s), vec![img, text]);
        assert!(!s.redo().unwrap());
    }

    #[test]
    fn undo_restores_removed_image_with_pixels() {
        let mut s = session();
        let img = s.add_image(&png_bytes(10, 10, [9, 9, 9, 255])).unwrap();
        s.remove_active().unwrap();
        assert!(s.export().unwrap().is_none());
        s.undo().unwrap();
        assert_eq!(ids(&s), vec![img]);
        assert!(s.export().unwrap().is_some());
    }

    #[test]
    fn failed_undo_keeps_history_and_scene_in_step() {
        // Unvalidated config: a NaN size serializes as null and cannot be read back
        let mut config = EditorConfig::default();
        config.sticker.font_size = f64::NAN;
        let mut s = session_with(config);
        s.add_sticker("🔥").unwrap();
        s.add_text().unwrap();

        assert!(matches!(s.undo(), Err(SessionError::Snapshot(_))));
        assert_eq!(s.history().cursor(), Some(2));
        assert_eq!(s.scene().len(), 2);
        assert!(!s.history().can_redo());
    }

    #[test]
    fn new_action_after_undo_discards_redo() {
        let mut s = session();
        s.add_text().unwrap();
        s.add_text().unwrap();
        s.undo().unwrap();
        let third = s.add_sticker("✨").unwrap();
        assert!(!s.redo().unwrap());
        assert!(s.scene().get(third).is_some());
        assert_eq!(s.scene().len(), 2);
    }

    // =========================================================================
    // Export and captions
    // =========================================================================

    #[test]
    fn export_past_the_pixel_limit_is_an_error() {
        let mut s = session();
        let img = s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        let huge = Transform {
            scale_x: Some(1e9),
            scale_y: Some(1e9),
            ..Transform::default()
        };
        assert!(s.transform(img, &huge).unwrap());
        assert!(matches!(
            s.export(),
            Err(SessionError::Compose(ComposeError::Surface(
                crate::render::SurfaceError::TooLarge { .. }
            )))
        ));
        assert!(s.caption_png().is_err());
    }

    #[test]
    fn export_is_twice_displayed_size() {
        let mut s = session();
        s.add_image(&png_bytes(400, 300, [0, 0, 0, 255])).unwrap();
        let exported = s.export().unwrap().unwrap();
        // 400x300 at scale 1.6 → 640x480 displayed → 1280x960
        assert_eq!((exported.width, exported.height), (1280, 960));
        assert!(exported.file_name.starts_with("clickin-export-"));
        assert!(exported.file_name.ends_with(".png"));
    }

    #[test]
    fn export_without_image_is_none() {
        let mut s = session();
        s.add_text().unwrap();
        assert!(s.export().unwrap().is_none());
    }

    #[test]
    fn export_twice_is_byte_identical() {
        let mut s = session();
        s.add_image(&png_bytes(50, 40, [10, 200, 30, 255])).unwrap();
        s.set_adjustment(Adjustment::Saturation, -40).unwrap();
        s.add_text().unwrap();
        let a = s.export().unwrap().unwrap();
        let b = s.export().unwrap().unwrap();
        assert_eq!(a.png, b.png);
    }

    #[test]
    fn caption_requires_image() {
        let s = session();
        let service = MockCaptionService::replying("unused");
        let err = s.generate_caption(&service, CaptionKind::Caption).unwrap_err();
        assert_eq!(err.to_string(), "Please add an image to generate a caption");
        assert!(service.requests.borrow().is_empty());
    }

    #[test]
    fn caption_uploads_displayed_size_png() {
        let mut s = session();
        s.add_image(&png_bytes(400, 300, [0, 0, 0, 255])).unwrap();
        let service = MockCaptionService::replying("A black square");
        let text = s.generate_caption(&service, CaptionKind::Post).unwrap();
        assert_eq!(text, "A black square");
        let requests = service.requests.borrow();
        assert_eq!(requests[0].0, CaptionKind::Post);

        let png = s.caption_png().unwrap().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn caption_failure_leaves_state_untouched() {
        let mut s = session();
        s.add_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
        let before = s.history().len();
        let service = MockCaptionService::failing("busy");
        let err = s.generate_caption(&service, CaptionKind::Caption).unwrap_err();
        assert_eq!(err.to_string(), "API request failed: busy");
        assert_eq!(s.history().len(), before);
        assert_eq!(s.scene().len(), 1);
    }

    #[test]
    fn preview_is_canvas_sized_with_background() {
        let s = session();
        let preview = s.render_preview().unwrap();
        assert_eq!(preview.dimensions(), (800, 600));
        assert_eq!(preview.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
