//! Canvas note editors.
//!
//! DESIGN
//! ======
//! `NoteEditor` is the private sticky note: it paints a local raster directly,
//! exports PNGs, and drives the publish workflow. Publishing is
//! non-destructive — the private note is destroyed only after the server
//! confirms the shared canvas exists, so a failed publish loses nothing.
//!
//! `CanvasEditor` wraps editing a shared canvas under the edit lock with the
//! same local-first discipline: paint the local raster immediately, ping the
//! server per point, and ship whole snapshots via `canvas:sync`.

use std::path::{Path, PathBuf};

use serde_json::json;
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

use crate::color::Color;
use crate::frame::{self, Data, Frame};
use crate::local::{DEFAULT_COLOR, DEFAULT_WIDTH, PRIVATE_BASE_COLOR};
use crate::raster::{BrushStyle, Raster, RasterError, brush_size_for_width};

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timestamp format failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

// =============================================================================
// PRIVATE NOTE
// =============================================================================

/// A private canvas note. Never networked until published.
pub struct NoteEditor {
    raster: Raster,
    style: BrushStyle,
    publish_pending: bool,
    destroyed: bool,
}

impl NoteEditor {
    #[must_use]
    pub fn new(resolution: u32) -> Self {
        Self {
            raster: Raster::new(resolution, resolution, PRIVATE_BASE_COLOR),
            style: BrushStyle::new(DEFAULT_COLOR, brush_size_for_width(DEFAULT_WIDTH)),
            publish_pending: false,
            destroyed: false,
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.style.set_color(color);
    }

    pub fn set_width(&mut self, width: f32) {
        self.style.set_size(brush_size_for_width(width));
    }

    pub fn erase(&mut self) {
        self.style.erase(self.raster.base_color());
    }

    pub fn begin_segment(&mut self) {
        self.raster.begin_segment();
    }

    /// Paint one point in normalized uv coordinates.
    pub fn paint(&mut self, u: f32, v: f32) {
        self.raster.paint(u, v, &self.style);
    }

    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    /// Export the note as a PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn export_png(&self) -> Result<Vec<u8>, RasterError> {
        self.raster.encode_png()
    }

    /// Save the note to `dir` as `StickyNote_<timestamp>.png` and return the
    /// written path.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, timestamp formatting, or the write fails.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, NoteError> {
        let ts = OffsetDateTime::now_utc()
            .format(format_description!("[year][month][day]T[hour][minute][second]"))?;
        let path = dir.join(format!("StickyNote_{ts}.png"));
        std::fs::write(&path, self.export_png()?)?;
        Ok(path)
    }

    // =========================================================================
    // PUBLISH WORKFLOW
    // =========================================================================

    /// Build the `canvas:publish` request carrying the note's PNG and base
    /// color. The note stays alive until [`NoteEditor::confirm_published`].
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails; the note is untouched.
    pub fn publish_request(&mut self, session_id: Uuid) -> Result<Frame, RasterError> {
        let png = self.export_png()?;
        self.publish_pending = true;

        let mut data = Data::new();
        data.insert("png".into(), frame::encode_bytes(&png));
        data.insert(
            "base_color".into(),
            serde_json::to_value(self.raster.base_color()).unwrap_or_default(),
        );
        Ok(Frame::request("canvas:publish", data).with_session_id(session_id))
    }

    /// Server confirmed the shared canvas: the private note may now go away.
    pub fn confirm_published(&mut self) {
        if self.publish_pending {
            self.publish_pending = false;
            self.destroyed = true;
        }
    }

    /// Publish failed or never completed: keep the note intact.
    pub fn publish_failed(&mut self) {
        self.publish_pending = false;
    }
}

// =============================================================================
// SHARED CANVAS EDITING
// =============================================================================

/// Editing session for one shared canvas. Painting is local-first; the server
/// sees activity pings per point and whole snapshots per segment.
pub struct CanvasEditor {
    session_id: Uuid,
    canvas_id: Uuid,
    raster: Raster,
    style: BrushStyle,
    editing: bool,
}

impl CanvasEditor {
    /// Open an editor over the latest known snapshot of a shared canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be decoded.
    pub fn open(
        session_id: Uuid,
        canvas_id: Uuid,
        snapshot: &[u8],
        base_color: Color,
    ) -> Result<Self, RasterError> {
        Ok(Self {
            session_id,
            canvas_id,
            raster: Raster::decode_png(snapshot, base_color)?,
            style: BrushStyle::new(DEFAULT_COLOR, brush_size_for_width(DEFAULT_WIDTH)),
            editing: false,
        })
    }

    #[must_use]
    pub fn canvas_id(&self) -> Uuid {
        self.canvas_id
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn set_color(&mut self, color: Color) {
        self.style.set_color(color);
    }

    pub fn set_width(&mut self, width: f32) {
        self.style.set_size(brush_size_for_width(width));
    }

    pub fn erase(&mut self) {
        self.style.erase(self.raster.base_color());
    }

    /// Build the edit-lock request. Editing starts only after the server
    /// grants it via [`CanvasEditor::granted`].
    #[must_use]
    pub fn edit_request(&self) -> Frame {
        let mut data = Data::new();
        data.insert("canvas_id".into(), json!(self.canvas_id));
        Frame::request("canvas:edit", data).with_session_id(self.session_id)
    }

    pub fn granted(&mut self) {
        self.editing = true;
    }

    /// Server force-released the lock: stop painting, keep the raster as-is
    /// (the accompanying release broadcast carries the canonical pixels).
    pub fn force_released(&mut self) {
        self.editing = false;
    }

    pub fn begin_segment(&mut self) {
        self.raster.begin_segment();
    }

    /// Paint one point locally and emit the holder's activity ping. No-op
    /// while not editing.
    pub fn paint(&mut self, u: f32, v: f32) -> Vec<Frame> {
        if !self.editing {
            return vec![];
        }
        self.raster.paint(u, v, &self.style);

        let mut data = Data::new();
        data.insert("canvas_id".into(), json!(self.canvas_id));
        vec![Frame::request("canvas:point", data).with_session_id(self.session_id)]
    }

    /// Upload the current raster as the new canonical snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn sync_frame(&self) -> Result<Frame, RasterError> {
        let png = self.raster.encode_png()?;
        let mut data = Data::new();
        data.insert("canvas_id".into(), json!(self.canvas_id));
        data.insert("png".into(), frame::encode_bytes(&png));
        Ok(Frame::request("canvas:sync", data).with_session_id(self.session_id))
    }

    /// Finish editing: a final sync followed by the release request.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails; the lock is then still held and
    /// release can be retried.
    pub fn release(&mut self) -> Result<Vec<Frame>, RasterError> {
        let sync = self.sync_frame()?;

        let mut data = Data::new();
        data.insert("canvas_id".into(), json!(self.canvas_id));
        let release = Frame::request("canvas:release", data).with_session_id(self.session_id);

        self.editing = false;
        Ok(vec![sync, release])
    }
}

#[cfg(test)]
#[path = "note_test.rs"]
mod tests;
