//! CLI output formatting for script runs and captions.
//!
//! # Output Format
//!
//! ```text
//! Steps
//! 001 add-image #0 from beach.jpg
//! 002 add-text #1
//! 003 undo (no effect)
//!
//! Layers
//! #2 Sticker Layer 🔥
//! #1 Text Layer "Double click to edit"
//! #0 Image Layer 400x300 (hidden)
//!
//! History
//!     3 snapshots, at 3
//!
//! Exports
//!     clickin-export-1718000000000.png 1280x960
//!         Saved: out/clickin-export-1718000000000.png
//! ```
//!
//! Layers are listed newest first, the same as the layer panel.
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::history::History;
use crate::layers::LayerRegistry;
use crate::scene::{ObjectKind, Scene};
use crate::script::{ScriptReport, StepOutcome};
use crate::session::{ExportedImage, Session};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate to `max` characters, adding "..." if truncated.
fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// One line per step, numbered from 1.
pub fn format_steps(steps: &[StepOutcome]) -> Vec<String> {
    let mut lines = vec!["Steps".to_string()];
    for step in steps {
        let mut line = format!("{} {}", format_index(step.index + 1), step.action);
        if let Some(detail) = &step.detail {
            line.push(' ');
            line.push_str(detail);
        }
        if !step.applied {
            line.push_str(" (no effect)");
        }
        lines.push(line);
    }
    lines
}

/// Layer panel: newest first, with a short description of each object.
pub fn format_layers(layers: &LayerRegistry, scene: &Scene) -> Vec<String> {
    let mut lines = vec!["Layers".to_string()];
    if layers.is_empty() {
        lines.push(format!("{}(empty)", indent(1)));
        return lines;
    }
    for entry in layers.list() {
        let mut line = format!("{} {}", entry.id, entry.name);
        if let Some(object) = scene.get(entry.id) {
            let detail = match &object.kind {
                ObjectKind::Image(image) => format!("{}x{}", image.width, image.height),
                ObjectKind::Text(text) => format!("\"{}\"", truncate_text(&text.content, 40)),
                ObjectKind::Sticker(sticker) => sticker.glyph.clone(),
            };
            line.push(' ');
            line.push_str(&detail);
        }
        if !entry.visible {
            line.push_str(" (hidden)");
        }
        lines.push(line);
    }
    lines
}

pub fn format_history(history: &History) -> Vec<String> {
    let position = history
        .cursor()
        .map_or("none".to_string(), |c| (c + 1).to_string());
    vec![
        "History".to_string(),
        format!(
            "{}{} snapshots, at {}",
            indent(1),
            history.len(),
            position
        ),
    ]
}

/// Exports with the paths they were written to under `out_dir`.
pub fn format_exports(exports: &[ExportedImage], out_dir: &Path) -> Vec<String> {
    let mut lines = vec!["Exports".to_string()];
    if exports.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    for export in exports {
        lines.push(format!(
            "{}{} {}x{}",
            indent(1),
            export.file_name,
            export.width,
            export.height
        ));
        lines.push(format!(
            "{}Saved: {}",
            indent(2),
            out_dir.join(&export.file_name).display()
        ));
    }
    lines
}

/// Everything a script run reports, sections separated by blank lines.
pub fn format_run_output(report: &ScriptReport, session: &Session, out_dir: &Path) -> Vec<String> {
    let mut lines = format_steps(&report.steps);
    lines.push(String::new());
    lines.extend(format_layers(session.layers(), session.scene()));
    lines.push(String::new());
    lines.extend(format_history(session.history()));
    lines.push(String::new());
    lines.extend(format_exports(&report.exports, out_dir));
    lines
}

/// Print script run output to stdout.
pub fn print_run_output(report: &ScriptReport, session: &Session, out_dir: &Path) {
    for line in format_run_output(report, session, out_dir) {
        println!("{}", line);
    }
}
