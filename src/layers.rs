//! Layer registry: the user-facing list of layers.
//!
//! Entries are kept in insertion order and listed newest first. This order is
//! independent of the scene's z-order; the two are linked only by
//! [`ObjectId`]. The registry never owns scene objects.

use crate::scene::{ObjectId, Scene};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Image,
    Text,
    Sticker,
}

impl LayerKind {
    pub fn display_name(self) -> &'static str {
        match self {
            LayerKind::Image => "Image Layer",
            LayerKind::Text => "Text Layer",
            LayerKind::Sticker => "Sticker Layer",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerKind::Image => "image",
            LayerKind::Text => "text",
            LayerKind::Sticker => "sticker",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub id: ObjectId,
    pub kind: LayerKind,
    pub name: String,
    pub visible: bool,
}

impl LayerEntry {
    pub fn new(id: ObjectId, kind: LayerKind) -> Self {
        Self {
            id,
            kind,
            name: kind.display_name().to_string(),
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRegistry {
    entries: Vec<LayerEntry>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry. An existing entry for the same object is replaced.
    pub fn add(&mut self, entry: LayerEntry) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<LayerEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: ObjectId) -> Option<&LayerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Flip visibility on both the entry and its scene object.
    ///
    /// Returns the new visibility, or `None` if the id is unknown.
    pub fn toggle_visibility(&mut self, id: ObjectId, scene: &mut Scene) -> Option<bool> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.visible = !entry.visible;
        if let Some(object) = scene.get_mut(id) {
            object.visible = entry.visible;
        }
        Some(entry.visible)
    }

    /// Entries, most recently added first.
    pub fn list(&self) -> impl Iterator<Item = &LayerEntry> {
        self.entries.iter().rev()
    }

    /// Object identities in insertion order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
