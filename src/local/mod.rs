//! Participant-side model: local render copies, the drawing pen, and the
//! private note editor.
//!
//! ARCHITECTURE
//! ============
//! The server owns canonical state; everything in this module is a local
//! render copy. The creator fast path lives here: a participant paints its own
//! strokes immediately and ignores the server's relays for them, so drawing
//! latency never includes a network round trip.

pub mod note;
pub mod pen;
pub mod replica;

use crate::color::{BLACK, BLUE, Color, GREEN, RED};

/// Selectable pen colors.
pub const PALETTE: [Color; 4] = [BLACK, RED, GREEN, BLUE];

/// Selectable stroke widths, in world units.
pub const STROKE_WIDTHS: [f32; 3] = [0.001, 0.005, 0.01];

pub const DEFAULT_COLOR: Color = BLACK;
pub const DEFAULT_WIDTH: f32 = 0.005;

/// Minimum pen travel before a new point is recorded.
pub const MOVE_THRESHOLD: f32 = 0.0001;

/// Background of private notes before they are published and recolored.
pub const PRIVATE_BASE_COLOR: Color = Color::opaque(0.9, 0.9, 0.6);
