//! Scene graph: the ordered set of drawable objects in an editing session.
//!
//! Objects are kept in z-order: index 0 is drawn first (bottom), the last
//! element is drawn on top. Two ordering rules hold at all times:
//!
//! - A newly inserted image goes to the very bottom. The first image in
//!   z-order is the **base image** that compositing and export are sized on.
//! - Text and sticker objects always sit above every image. Inserting an image
//!   or selecting one re-raises them, preserving their relative order.
//!
//! The layer registry is a separate, insertion-ordered index over the same
//! objects (see [`crate::layers`]); the scene graph owns object lifetime.
//!
//! Operations on an empty scene, or on identities that no longer exist, are
//! no-ops rather than errors.

use crate::ingest::SourceId;
use crate::render::{Color, Filter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a scene object within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which point of the object its `left`/`top` position refers to, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Left edge (x) or top edge (y).
    #[default]
    Start,
    Center,
}

/// Geometry shared by every object kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    #[serde(default)]
    pub origin_x: Origin,
    #[serde(default)]
    pub origin_y: Origin,
    /// Clockwise rotation in degrees around the origin point.
    #[serde(default)]
    pub angle: f64,
}

impl Placement {
    /// Top-left anchored placement at scale 1.
    pub fn at(left: f64, top: f64) -> Self {
        Self {
            left,
            top,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: Origin::Start,
            origin_y: Origin::Start,
            angle: 0.0,
        }
    }

    /// Center anchored placement at scale 1.
    pub fn centered(left: f64, top: f64) -> Self {
        Self {
            origin_x: Origin::Center,
            origin_y: Origin::Center,
            ..Self::at(left, top)
        }
    }

    pub fn with_scale(self, scale: f64) -> Self {
        Self {
            scale_x: scale,
            scale_y: scale,
            ..self
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

/// Pixel region of a source raster, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Horizontal text alignment inside the text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Visual style of a text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub fill: Color,
    #[serde(default = "transparent")]
    pub background: Color,
    /// Extra spacing after each character, in thousandths of an em.
    #[serde(default)]
    pub char_spacing: f64,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

fn transparent() -> Color {
    Color::TRANSPARENT
}

fn default_line_height() -> f64 {
    1.0
}

impl TextStyle {
    pub fn new(font_family: impl Into<String>, font_size: f64, fill: Color) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
            fill,
            background: Color::TRANSPARENT,
            char_spacing: 0.0,
            line_height: default_line_height(),
            align: TextAlign::Left,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// A raster layer. `width`/`height` are the intrinsic size: the source size,
/// or the crop size once a crop has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub source: SourceId,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObject {
    pub content: String,
    pub style: TextStyle,
}

/// An emoji or short glyph drawn at a fixed size. Not editable through text
/// edits, and always kept above images like text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerObject {
    pub glyph: String,
    pub style: TextStyle,
}

/// The object kinds a scene can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectKind {
    Image(ImageObject),
    Text(TextObject),
    Sticker(StickerObject),
}

impl ObjectKind {
    pub fn is_image(&self) -> bool {
        matches!(self, ObjectKind::Image(_))
    }
}

/// One drawable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    #[serde(flatten)]
    pub placement: Placement,
    pub visible: bool,
    pub selectable: bool,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn as_image(&self) -> Option<&ImageObject> {
        match &self.kind {
            ObjectKind::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageObject> {
        match &mut self.kind {
            ObjectKind::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Z-ordered object list plus the current selection.
///
/// The selection is interaction state and is not serialized: a scene restored
/// from a snapshot starts with nothing selected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    objects: Vec<SceneObject>,
    #[serde(skip)]
    active: Option<ObjectId>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object and return its identity.
    ///
    /// Images go to the bottom of the stack; everything else goes on top.
    pub fn insert(&mut self, kind: ObjectKind, placement: Placement) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let object = SceneObject {
            id,
            placement,
            visible: true,
            selectable: true,
            kind,
        };
        if object.kind.is_image() {
            self.objects.insert(0, object);
            self.raise_overlays();
        } else {
            self.objects.push(object);
        }
        id
    }

    /// Remove an object by identity.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        Some(self.objects.remove(index))
    }

    /// Remove every object and the selection. Identities are never reused.
    pub fn clear(&mut self) -> Vec<SceneObject> {
        self.active = None;
        std::mem::take(&mut self.objects)
    }

    /// Select an object. Selecting an image re-raises text and stickers.
    ///
    /// Returns `false` (and leaves the selection alone) if the object does
    /// not exist.
    pub fn select(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.get(id) else {
            return false;
        };
        let is_image = object.kind.is_image();
        self.active = Some(id);
        if is_image {
            self.raise_overlays();
        }
        true
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    pub fn active_id(&self) -> Option<ObjectId> {
        self.active
    }

    pub fn active(&self) -> Option<&SceneObject> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// All objects, bottom to top.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// The first image in z-order.
    pub fn base_image(&self) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.kind.is_image())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Replace the contents with a restored scene.
    ///
    /// The identity counter never moves backwards, so objects created after
    /// an undo cannot collide with identities still referenced elsewhere.
    pub fn restore(&mut self, restored: Scene) {
        let next_id = self.next_id.max(restored.next_id);
        self.objects = restored.objects;
        self.next_id = next_id;
        self.active = None;
    }

    /// Stable partition: images first, then text and stickers, each group in
    /// its existing relative order.
    fn raise_overlays(&mut self) {
        let (images, overlays): (Vec<_>, Vec<_>) = std::mem::take(&mut self.objects)
            .into_iter()
            .partition(|o| o.kind.is_image());
        self.objects = images;
        self.objects.extend(overlays);
    }
}
