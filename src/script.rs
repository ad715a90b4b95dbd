//! Edit scripts: a TOML list of intents replayed against a session.
//!
//! Scripts let the CLI drive a session without a UI. Each `[[step]]` names an
//! `action` and its arguments:
//!
//! ```toml
//! [[step]]
//! action = "add-image"
//! path = "beach.jpg"
//!
//! [[step]]
//! action = "add-text"
//!
//! [[step]]
//! action = "edit-text"
//! content = "Summer!"
//! fill = "#ff0000"
//! font_size = 64
//!
//! [[step]]
//! action = "adjust"
//! adjustment = "brightness"
//! value = 20
//!
//! [[step]]
//! action = "export"
//! ```
//!
//! Text edits and transforms apply to the selected object, the same as the
//! editor panels. Image paths are relative to the script's directory.

use crate::adjust::Adjustment;
use crate::render::Rect;
use crate::scene::ObjectId;
use crate::session::{ExportedImage, Session, SessionError, TextEdit, Transform};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid script: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Step {index} ({action}) failed: {source}")]
    Step {
        index: usize,
        action: &'static str,
        source: SessionError,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    AddImage { path: PathBuf },
    AddImages { paths: Vec<PathBuf> },
    AddText,
    AddSticker { glyph: String },
    Select { id: u64 },
    Deselect,
    Remove,
    EditText(TextEdit),
    Transform(Transform),
    ToggleLayer { id: u64 },
    Adjust { adjustment: Adjustment, value: i32 },
    ResetAdjustments,
    StartCrop,
    CropRegion { x: f64, y: f64, width: f64, height: f64 },
    ApplyCrop,
    CancelCrop,
    Undo,
    Redo,
    Export,
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::AddImage { .. } => "add-image",
            Step::AddImages { .. } => "add-images",
            Step::AddText => "add-text",
            Step::AddSticker { .. } => "add-sticker",
            Step::Select { .. } => "select",
            Step::Deselect => "deselect",
            Step::Remove => "remove",
            Step::EditText(_) => "edit-text",
            Step::Transform(_) => "transform",
            Step::ToggleLayer { .. } => "toggle-layer",
            Step::Adjust { .. } => "adjust",
            Step::ResetAdjustments => "reset-adjustments",
            Step::StartCrop => "start-crop",
            Step::CropRegion { .. } => "crop-region",
            Step::ApplyCrop => "apply-crop",
            Step::CancelCrop => "cancel-crop",
            Step::Undo => "undo",
            Step::Redo => "redo",
            Step::Export => "export",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub step: Vec<Step>,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let source = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    /// `false` when the step was a no-op (nothing selected, no image, ...).
    pub applied: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptReport {
    pub steps: Vec<StepOutcome>,
    pub exports: Vec<ExportedImage>,
}

/// Replay `script` against `session`. Stops at the first failing step.
///
/// Skipped files in `add-images` are reported in the step detail rather than
/// failing the script.
pub fn run_script(
    session: &mut Session,
    script: &Script,
    base_dir: &Path,
) -> Result<ScriptReport, ScriptError> {
    let mut report = ScriptReport::default();
    for (index, step) in script.step.iter().enumerate() {
        let action = step.action();
        let fail = |source: SessionError| ScriptError::Step {
            index,
            action,
            source,
        };
        log::debug!("step {index}: {action}");
        let (applied, detail) = match step {
            Step::AddImage { path } => {
                let bytes = read_file(&base_dir.join(path))?;
                let id = session.add_image(&bytes).map_err(fail)?;
                (true, Some(format!("{id} from {}", path.display())))
            }
            Step::AddImages { paths } => {
                let batch = paths
                    .iter()
                    .map(|p| read_file(&base_dir.join(p)))
                    .collect::<Result<Vec<_>, _>>()?;
                let results = session.add_images(&batch);
                let added = results.iter().filter(|r| r.is_ok()).count();
                let skipped: Vec<String> = paths
                    .iter()
                    .zip(&results)
                    .filter_map(|(p, r)| r.as_ref().err().map(|e| format!("{}: {e}", p.display())))
                    .collect();
                let mut detail = format!("{added} of {} added", paths.len());
                if !skipped.is_empty() {
                    detail.push_str(&format!(", skipped {}", skipped.join("; ")));
                }
                (added > 0, Some(detail))
            }
            Step::AddText => {
                let id = session.add_text().map_err(fail)?;
                (true, Some(id.to_string()))
            }
            Step::AddSticker { glyph } => {
                let id = session.add_sticker(glyph).map_err(fail)?;
                (true, Some(id.to_string()))
            }
            Step::Select { id } => (session.select(ObjectId(*id)), None),
            Step::Deselect => {
                session.clear_selection();
                (true, None)
            }
            Step::Remove => (session.remove_active().map_err(fail)?, None),
            Step::EditText(edit) => match session.active_id() {
                Some(id) => (session.update_text(id, edit).map_err(fail)?, None),
                None => (false, None),
            },
            Step::Transform(change) => match session.active_id() {
                Some(id) => (session.transform(id, change).map_err(fail)?, None),
                None => (false, None),
            },
            Step::ToggleLayer { id } => {
                let visible = session
                    .toggle_layer_visibility(ObjectId(*id))
                    .map_err(fail)?;
                (
                    visible.is_some(),
                    visible.map(|v| if v { "visible" } else { "hidden" }.to_string()),
                )
            }
            Step::Adjust { adjustment, value } => {
                let applied = session.set_adjustment(*adjustment, *value).map_err(fail)?;
                let stored = session.adjustments().get(*adjustment);
                (applied, Some(format!("{adjustment} = {stored}")))
            }
            Step::ResetAdjustments => (session.reset_adjustments().map_err(fail)?, None),
            Step::StartCrop => (session.start_crop(), None),
            Step::CropRegion {
                x,
                y,
                width,
                height,
            } => (
                session.set_crop_region(Rect::new(*x, *y, *width, *height)),
                None,
            ),
            Step::ApplyCrop => (session.apply_crop().map_err(fail)?, None),
            Step::CancelCrop => (session.cancel_crop(), None),
            Step::Undo => (session.undo().map_err(fail)?, None),
            Step::Redo => (session.redo().map_err(fail)?, None),
            Step::Export => match session.export().map_err(fail)? {
                Some(exported) => {
                    let detail = format!(
                        "{} ({}x{})",
                        exported.file_name, exported.width, exported.height
                    );
                    report.exports.push(exported);
                    (true, Some(detail))
                }
                None => (false, Some("no image to export".to_string())),
            },
        };
        if !applied {
            log::warn!("step {index} ({action}) had no effect");
        }
        report.steps.push(StepOutcome {
            index,
            action,
            applied,
            detail,
        });
    }
    Ok(report)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ScriptError> {
    fs::read(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })
}
