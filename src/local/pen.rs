//! The drawing pen: style state, privacy toggle, and the shared-stroke frame
//! sequence.
//!
//! DESIGN
//! ======
//! Shared drawing is local-first. The pen paints its replica immediately and
//! emits `stroke:start/point/end` frames for the server to relay; the spawn
//! reply arrives out of band (`stroke_ready`), and ending a stroke pre-spawns
//! the next one so the id is usually ready before the pen touches down again.
//!
//! Private strokes never produce frames. They render with `muted()` colors so
//! private annotations stay visually distinct from shared ones.

use serde_json::json;
use uuid::Uuid;

use crate::color::Color;
use crate::frame::{Data, Frame};
use crate::geom::{Bounds, Point};
use crate::local::replica::Replica;
use crate::local::{DEFAULT_COLOR, DEFAULT_WIDTH, MOVE_THRESHOLD};

/// A stroke drawn in private mode. Local only.
#[derive(Debug, Clone)]
pub struct PrivateStroke {
    pub color: Color,
    pub width: f32,
    pub points: Vec<Point>,
    pub bounds: Option<Bounds>,
}

pub struct Pen {
    session_id: Uuid,
    color: Color,
    width: f32,
    private: bool,
    /// Shared stroke id from the last spawn reply, waiting for pen-down.
    ready_stroke: Option<Uuid>,
    /// Shared stroke currently being drawn.
    active_stroke: Option<Uuid>,
    active_private: Option<PrivateStroke>,
    /// Finished private strokes, kept for local rendering.
    pub private_strokes: Vec<PrivateStroke>,
    last_point: Option<Point>,
}

impl Pen {
    #[must_use]
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            color: DEFAULT_COLOR,
            width: DEFAULT_WIDTH,
            private: false,
            ready_stroke: None,
            active_stroke: None,
            active_private: None,
            private_strokes: Vec::new(),
            last_point: None,
        }
    }

    // =========================================================================
    // STYLE
    // =========================================================================

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    pub fn set_private(&mut self, private: bool) {
        self.private = private;
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// Color actually painted with: private strokes are muted.
    #[must_use]
    pub fn effective_color(&self) -> Color {
        if self.private { self.color.muted() } else { self.color }
    }

    // =========================================================================
    // SPAWN HANDSHAKE
    // =========================================================================

    /// Request a shared stroke object. The reply is targeted; feed its id back
    /// via [`Pen::stroke_ready`].
    #[must_use]
    pub fn spawn_request(&self) -> Frame {
        Frame::request("stroke:spawn", Data::new()).with_session_id(self.session_id)
    }

    pub fn stroke_ready(&mut self, stroke_id: Uuid) {
        self.ready_stroke = Some(stroke_id);
    }

    #[must_use]
    pub fn has_ready_stroke(&self) -> bool {
        self.ready_stroke.is_some()
    }

    // =========================================================================
    // DRAWING
    // =========================================================================

    /// Pen down. Shared mode consumes the ready stroke and emits the style
    /// handshake plus the first point; private mode starts a local stroke and
    /// emits nothing.
    pub fn begin(&mut self, replica: &mut Replica, at: Point) -> Vec<Frame> {
        self.last_point = Some(at);

        if self.private {
            let mut stroke = PrivateStroke {
                color: self.effective_color(),
                width: self.width,
                points: Vec::new(),
                bounds: None,
            };
            stroke.points.push(at);
            stroke.bounds = Some(Bounds::from_point(at));
            self.active_private = Some(stroke);
            return vec![];
        }

        let Some(stroke_id) = self.ready_stroke.take() else {
            // Spawn reply hasn't arrived; nothing to draw on yet.
            return vec![];
        };
        self.active_stroke = Some(stroke_id);

        // Fast path: paint locally before the server ever sees the frames.
        replica.register_own_stroke(stroke_id, self.color, self.width);
        replica.paint_own_point(stroke_id, at);

        let mut start = Data::new();
        start.insert("stroke_id".into(), json!(stroke_id));
        start.insert("color".into(), serde_json::to_value(self.color).unwrap_or_default());
        start.insert("width".into(), json!(self.width));

        vec![
            Frame::request("stroke:start", start).with_session_id(self.session_id),
            self.point_frame(stroke_id, at),
        ]
    }

    /// Pen travel. Points closer than the movement threshold are dropped.
    pub fn move_to(&mut self, replica: &mut Replica, p: Point) -> Vec<Frame> {
        if let Some(last) = self.last_point {
            if last.distance(p) < MOVE_THRESHOLD {
                return vec![];
            }
        }
        self.last_point = Some(p);

        if let Some(stroke) = &mut self.active_private {
            stroke.points.push(p);
            match &mut stroke.bounds {
                Some(bounds) => bounds.extend(p),
                None => stroke.bounds = Some(Bounds::from_point(p)),
            }
            return vec![];
        }

        let Some(stroke_id) = self.active_stroke else {
            return vec![];
        };
        replica.paint_own_point(stroke_id, p);
        vec![self.point_frame(stroke_id, p)]
    }

    /// Pen up. Ends the stroke; in shared mode also pre-spawns the next one.
    pub fn end(&mut self, replica: &mut Replica) -> Vec<Frame> {
        self.last_point = None;

        if let Some(stroke) = self.active_private.take() {
            self.private_strokes.push(stroke);
            return vec![];
        }

        let Some(stroke_id) = self.active_stroke.take() else {
            return vec![];
        };
        replica.finalize_own(stroke_id);

        let mut end = Data::new();
        end.insert("stroke_id".into(), json!(stroke_id));

        vec![
            Frame::request("stroke:end", end).with_session_id(self.session_id),
            self.spawn_request(),
        ]
    }

    fn point_frame(&self, stroke_id: Uuid, p: Point) -> Frame {
        let mut data = Data::new();
        data.insert("stroke_id".into(), json!(stroke_id));
        data.insert("point".into(), serde_json::to_value(p).unwrap_or_default());
        Frame::request("stroke:point", data).with_session_id(self.session_id)
    }
}

#[cfg(test)]
#[path = "pen_test.rs"]
mod tests;
