//! Stroke service — spawn, style handshake, point replication, finalization.
//!
//! DESIGN
//! ======
//! The canonical point stream lives here. Points are appended in server
//! arrival order under the session lock, which is the order every participant
//! observes. Bounds grow incrementally per accepted point and freeze with the
//! stream when the stroke ends.
//!
//! Operations on unknown stroke ids return `Stale`; the dispatch layer treats
//! late messages about a dead object as harmless no-ops rather than errors.

use tracing::info;
use uuid::Uuid;

use crate::color::Color;
use crate::geom::{Bounds, Point};
use crate::state::{AppState, SharedStroke};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StrokeError {
    #[error("session not loaded: {0}")]
    SessionNotLoaded(Uuid),
    #[error("stale stroke reference: {0}")]
    Stale(Uuid),
    #[error("stroke not owned by requester: {0}")]
    NotOwner(Uuid),
}

impl crate::frame::ErrorCode for StrokeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotLoaded(_) => "E_SESSION_NOT_LOADED",
            Self::Stale(_) => "E_STALE_OBJECT",
            Self::NotOwner(_) => "E_NOT_OWNER",
        }
    }
}

impl StrokeError {
    /// Stale references are ignored silently per the error taxonomy.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

// =============================================================================
// SPAWN
// =============================================================================

/// Spawn a shared stroke owned by `owner`. The returned id is delivered to
/// the requester only (targeted), never broadcast.
///
/// Returns `Ok(None)` when the owner already has an unfinished stroke — the
/// duplicate request silently has no effect.
///
/// # Errors
///
/// Returns `SessionNotLoaded` if the session isn't in memory.
pub async fn spawn_stroke(state: &AppState, session_id: Uuid, owner: Uuid) -> Result<Option<Uuid>, StrokeError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(StrokeError::SessionNotLoaded(session_id))?;

    let has_unfinished = session
        .strokes
        .values()
        .any(|s| s.owner == owner && !s.is_finalized());
    if has_unfinished {
        return Ok(None);
    }

    let id = Uuid::new_v4();
    session.strokes.insert(id, SharedStroke::new(id, owner));
    info!(%session_id, stroke_id = %id, %owner, "spawned shared stroke");
    Ok(Some(id))
}

// =============================================================================
// DRAWING
// =============================================================================

/// Record stroke style before the first point. Relayed to non-creators so no
/// participant ever renders a point with a default style.
///
/// # Errors
///
/// Returns `Stale` for an unknown stroke and `NotOwner` when the sender does
/// not own it.
pub async fn start_stroke(
    state: &AppState,
    session_id: Uuid,
    stroke_id: Uuid,
    sender: Uuid,
    color: Color,
    width: f32,
) -> Result<(), StrokeError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(StrokeError::SessionNotLoaded(session_id))?;
    let stroke = session
        .strokes
        .get_mut(&stroke_id)
        .ok_or(StrokeError::Stale(stroke_id))?;

    if stroke.owner != sender {
        return Err(StrokeError::NotOwner(stroke_id));
    }

    stroke.color = color;
    stroke.width = width;
    Ok(())
}

/// Append one point to the canonical stream and grow the bounds.
///
/// # Errors
///
/// Returns `Stale` for an unknown or already-finalized stroke and `NotOwner`
/// when the sender does not own it.
pub async fn append_point(
    state: &AppState,
    session_id: Uuid,
    stroke_id: Uuid,
    sender: Uuid,
    point: Point,
) -> Result<(), StrokeError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(StrokeError::SessionNotLoaded(session_id))?;
    let stroke = session
        .strokes
        .get_mut(&stroke_id)
        .ok_or(StrokeError::Stale(stroke_id))?;

    if stroke.owner != sender {
        return Err(StrokeError::NotOwner(stroke_id));
    }
    if !stroke.stream.push(point) {
        // Points are never retracted and never accepted after the end
        // handshake; a late point is a no-op.
        return Err(StrokeError::Stale(stroke_id));
    }

    match &mut stroke.bounds {
        Some(bounds) => bounds.extend(point),
        None => stroke.bounds = Some(Bounds::from_point(point)),
    }
    Ok(())
}

/// Finalize a stroke: freeze the stream and bounds. Second step of the end
/// handshake; the relay to non-creators is handled by the dispatch layer.
///
/// # Errors
///
/// Returns `Stale` for an unknown stroke and `NotOwner` when the sender does
/// not own it.
pub async fn end_stroke(
    state: &AppState,
    session_id: Uuid,
    stroke_id: Uuid,
    sender: Uuid,
) -> Result<Option<Bounds>, StrokeError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(StrokeError::SessionNotLoaded(session_id))?;
    let stroke = session
        .strokes
        .get_mut(&stroke_id)
        .ok_or(StrokeError::Stale(stroke_id))?;

    if stroke.owner != sender {
        return Err(StrokeError::NotOwner(stroke_id));
    }

    stroke.stream.freeze();
    info!(%session_id, %stroke_id, points = stroke.stream.len(), "stroke finalized");
    Ok(stroke.bounds)
}

// =============================================================================
// DELETE
// =============================================================================

/// Destroy a shared stroke. Any participant may delete (the physical delete
/// gesture is not owner-gated).
///
/// # Errors
///
/// Returns `Stale` if the stroke doesn't exist.
pub async fn delete_stroke(state: &AppState, session_id: Uuid, stroke_id: Uuid) -> Result<(), StrokeError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(StrokeError::SessionNotLoaded(session_id))?;

    if session.strokes.remove(&stroke_id).is_none() {
        return Err(StrokeError::Stale(stroke_id));
    }
    info!(%session_id, %stroke_id, "deleted shared stroke");
    Ok(())
}

#[cfg(test)]
#[path = "stroke_test.rs"]
mod tests;
