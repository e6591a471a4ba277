//! A participant's local render copy of the shared scene.
//!
//! DESIGN
//! ======
//! Relayed frames are applied in arrival order, which by the server's append
//! discipline equals canonical order. Strokes this participant created are
//! registered as own strokes: the fast path already painted them, so relayed
//! `stroke:start/point/end` frames for them are dropped (deletes still apply —
//! any participant may destroy any stroke).

use std::collections::{HashMap, HashSet};

use tracing::warn;
use uuid::Uuid;

use crate::color::Color;
use crate::frame::{Frame, Status};
use crate::geom::{Bounds, Point};
use crate::services::session::{CanvasSnapshot, StrokeSnapshot};

/// Local render copy of one shared stroke.
#[derive(Debug, Clone)]
pub struct RemoteStroke {
    pub id: Uuid,
    pub color: Color,
    pub width: f32,
    pub points: Vec<Point>,
    pub bounds: Option<Bounds>,
    pub finalized: bool,
}

impl RemoteStroke {
    fn new(id: Uuid, color: Color, width: f32) -> Self {
        Self { id, color, width, points: Vec::new(), bounds: None, finalized: false }
    }

    fn push(&mut self, p: Point) {
        self.points.push(p);
        match &mut self.bounds {
            Some(bounds) => bounds.extend(p),
            None => self.bounds = Some(Bounds::from_point(p)),
        }
    }
}

/// Local render copy of one shared canvas.
#[derive(Debug, Clone)]
pub struct RemoteCanvas {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub base_color: Color,
    /// Latest PNG snapshot seen; replaced wholesale, never merged.
    pub snapshot: Vec<u8>,
    pub locked_by: Option<Uuid>,
}

/// The participant's view of a session's shared objects.
pub struct Replica {
    client_id: Uuid,
    pub strokes: HashMap<Uuid, RemoteStroke>,
    pub canvases: HashMap<Uuid, RemoteCanvas>,
    own_strokes: HashSet<Uuid>,
}

impl Replica {
    #[must_use]
    pub fn new(client_id: Uuid) -> Self {
        Self {
            client_id,
            strokes: HashMap::new(),
            canvases: HashMap::new(),
            own_strokes: HashSet::new(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    // =========================================================================
    // CREATOR FAST PATH
    // =========================================================================

    /// Register a stroke this participant created and start rendering it
    /// immediately, without waiting for any relay.
    pub fn register_own_stroke(&mut self, id: Uuid, color: Color, width: f32) {
        self.own_strokes.insert(id);
        self.strokes.insert(id, RemoteStroke::new(id, color, width));
    }

    pub fn paint_own_point(&mut self, id: Uuid, p: Point) {
        if let Some(stroke) = self.strokes.get_mut(&id) {
            stroke.push(p);
        }
    }

    pub fn finalize_own(&mut self, id: Uuid) {
        if let Some(stroke) = self.strokes.get_mut(&id) {
            stroke.finalized = true;
        }
    }

    #[must_use]
    pub fn is_own_stroke(&self, id: Uuid) -> bool {
        self.own_strokes.contains(&id)
    }

    // =========================================================================
    // FRAME APPLICATION
    // =========================================================================

    /// Apply one server frame to the local scene. Unknown or irrelevant frames
    /// are ignored.
    pub fn apply(&mut self, frame: &Frame) {
        match (frame.syscall.as_str(), frame.status) {
            ("session:join", Status::Done) => self.load_snapshot(frame),
            ("stroke:start", Status::Request) => self.apply_stroke_start(frame),
            ("stroke:point", Status::Request) => self.apply_stroke_point(frame),
            ("stroke:end", Status::Request) => self.apply_stroke_end(frame),
            ("stroke:delete", Status::Request | Status::Done) => {
                if let Some(id) = frame.data_uuid("stroke_id") {
                    self.strokes.remove(&id);
                    self.own_strokes.remove(&id);
                }
            }
            ("canvas:create", Status::Request) => self.apply_canvas_create(frame),
            ("canvas:locked", Status::Request) => {
                if let Some(canvas) = self.canvas_for(frame) {
                    canvas.locked_by = frame.data_uuid("holder");
                }
            }
            ("canvas:sync", Status::Request) => {
                if let Some(png) = frame.data_bytes("png") {
                    if let Some(canvas) = self.canvas_for(frame) {
                        canvas.snapshot = png;
                    }
                }
            }
            ("canvas:release", Status::Request | Status::Done) => {
                if let Some(png) = frame.data_bytes("png") {
                    if let Some(canvas) = self.canvas_for(frame) {
                        canvas.snapshot = png;
                        canvas.locked_by = None;
                    }
                }
            }
            ("canvas:force_release", Status::Request) => {
                if let Some(canvas) = self.canvas_for(frame) {
                    canvas.locked_by = None;
                }
            }
            ("canvas:delete", Status::Request | Status::Done) => {
                if let Some(id) = frame.data_uuid("canvas_id") {
                    self.canvases.remove(&id);
                }
            }
            _ => {}
        }
    }

    fn canvas_for(&mut self, frame: &Frame) -> Option<&mut RemoteCanvas> {
        frame
            .data_uuid("canvas_id")
            .and_then(|id| self.canvases.get_mut(&id))
    }

    /// Late-join reconciliation: rebuild the whole scene from the join reply.
    fn load_snapshot(&mut self, frame: &Frame) {
        let strokes: Vec<StrokeSnapshot> = frame.data_value("strokes").unwrap_or_default();
        let canvases: Vec<CanvasSnapshot> = frame.data_value("canvases").unwrap_or_default();

        for snap in strokes {
            let mut stroke = RemoteStroke::new(snap.id, snap.color, snap.width);
            for p in snap.points {
                stroke.push(p);
            }
            stroke.finalized = snap.finalized;
            self.strokes.insert(snap.id, stroke);
        }

        for snap in canvases {
            let Some(png) = crate::frame::decode_bytes(&snap.png) else {
                warn!(canvas_id = %snap.id, "replica: undecodable snapshot in join reply");
                continue;
            };
            self.canvases.insert(
                snap.id,
                RemoteCanvas {
                    id: snap.id,
                    width: snap.width,
                    height: snap.height,
                    base_color: snap.base_color,
                    snapshot: png,
                    locked_by: None,
                },
            );
        }
    }

    fn apply_canvas_create(&mut self, frame: &Frame) {
        let Some(id) = frame.data_uuid("canvas_id") else {
            return;
        };
        let Some(png) = frame.data_bytes("png") else {
            return;
        };
        let width = frame.data.get("width").and_then(serde_json::Value::as_u64);
        let height = frame.data.get("height").and_then(serde_json::Value::as_u64);
        let (Some(width), Some(height)) = (width, height) else {
            return;
        };
        let base_color = frame
            .data_value::<Color>("base_color")
            .unwrap_or(crate::state::SHARED_BASE_COLOR);

        self.canvases.insert(
            id,
            RemoteCanvas {
                id,
                width: u32::try_from(width).unwrap_or_default(),
                height: u32::try_from(height).unwrap_or_default(),
                base_color,
                snapshot: png,
                locked_by: None,
            },
        );
    }

    fn apply_stroke_start(&mut self, frame: &Frame) {
        let Some(id) = frame.data_uuid("stroke_id") else {
            return;
        };
        if self.own_strokes.contains(&id) {
            return;
        }
        let Some(color) = frame.data_value::<Color>("color") else {
            return;
        };
        let Some(width) = frame.data_f32("width") else {
            return;
        };
        self.strokes.insert(id, RemoteStroke::new(id, color, width));
    }

    fn apply_stroke_point(&mut self, frame: &Frame) {
        let Some(id) = frame.data_uuid("stroke_id") else {
            return;
        };
        if self.own_strokes.contains(&id) {
            return;
        }
        let Some(p) = frame.data_value::<Point>("point") else {
            return;
        };
        if let Some(stroke) = self.strokes.get_mut(&id) {
            stroke.push(p);
        }
    }

    fn apply_stroke_end(&mut self, frame: &Frame) {
        let Some(id) = frame.data_uuid("stroke_id") else {
            return;
        };
        if self.own_strokes.contains(&id) {
            return;
        }
        if let Some(stroke) = self.strokes.get_mut(&id) {
            stroke.finalized = true;
            if let Some(bounds) = frame.data_value::<Bounds>("bounds") {
                stroke.bounds = Some(bounds);
            }
        }
    }
}

#[cfg(test)]
#[path = "replica_test.rs"]
mod tests;
