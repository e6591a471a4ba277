//! Canvas service — edit lock, paint activity, and snapshot replication.
//!
//! DESIGN
//! ======
//! A shared canvas has exactly one legitimate writer at a time, enforced by
//! the edit lock. The server never rasterizes per point — per-point messages
//! exist purely to refresh lock activity; only whole PNG snapshots move pixel
//! state, and each upload atomically replaces the canonical snapshot. The
//! inactivity sweep in `services::sweep` is the only recovery path for a
//! holder that vanishes without releasing.

use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use crate::raster::{Raster, RasterError};
use crate::state::{AppState, EditLock, SessionState, SharedCanvas};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("session not loaded: {0}")]
    SessionNotLoaded(Uuid),
    #[error("stale canvas reference: {0}")]
    Stale(Uuid),
    #[error("canvas is being edited by another participant")]
    Busy { holder: Uuid },
    #[error("sender does not hold the edit lock")]
    NotHolder,
    #[error("snapshot rejected: {0}")]
    BadSnapshot(#[from] RasterError),
}

impl crate::frame::ErrorCode for CanvasError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotLoaded(_) => "E_SESSION_NOT_LOADED",
            Self::Stale(_) => "E_STALE_OBJECT",
            Self::Busy { .. } => "E_CANVAS_BUSY",
            Self::NotHolder => "E_NOT_HOLDER",
            Self::BadSnapshot(_) => "E_BAD_SNAPSHOT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl CanvasError {
    /// Stale references and non-holder activity pings are dropped silently.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Stale(_) | Self::NotHolder)
    }
}

fn canvas_mut<'s>(
    session: &'s mut SessionState,
    canvas_id: Uuid,
) -> Result<&'s mut SharedCanvas, CanvasError> {
    session
        .canvases
        .get_mut(&canvas_id)
        .ok_or(CanvasError::Stale(canvas_id))
}

// =============================================================================
// EDIT LOCK
// =============================================================================

/// Acquire the edit lock. Succeeds only from Idle; a concurrent holder means
/// `Busy` — the loser is informed, never queued.
///
/// # Errors
///
/// Returns `Busy` while another participant holds the lock.
pub async fn acquire_lock(
    state: &AppState,
    session_id: Uuid,
    canvas_id: Uuid,
    client_id: Uuid,
    now: Instant,
) -> Result<(), CanvasError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = canvas_mut(session, canvas_id)?;

    if let Some(lock) = &canvas.lock {
        return Err(CanvasError::Busy { holder: lock.holder });
    }

    canvas.lock = Some(EditLock { holder: client_id, last_activity: now });
    info!(%session_id, %canvas_id, holder = %client_id, "edit lock acquired");
    Ok(())
}

/// Refresh lock activity for one paint point. The point itself is not
/// rasterized server-side.
///
/// # Errors
///
/// Returns `NotHolder` (silent) when the sender doesn't hold the lock.
pub async fn paint_activity(
    state: &AppState,
    session_id: Uuid,
    canvas_id: Uuid,
    client_id: Uuid,
    now: Instant,
) -> Result<(), CanvasError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = canvas_mut(session, canvas_id)?;

    match &mut canvas.lock {
        Some(lock) if lock.holder == client_id => {
            lock.last_activity = now;
            Ok(())
        }
        _ => Err(CanvasError::NotHolder),
    }
}

/// Release the edit lock and return the canonical snapshot for the final
/// all-participants push. Idempotent when the lock is already gone (the sweep
/// may have force-released first).
///
/// # Errors
///
/// Returns `NotHolder` when a different participant holds the lock.
pub async fn release_lock(
    state: &AppState,
    session_id: Uuid,
    canvas_id: Uuid,
    client_id: Uuid,
) -> Result<Vec<u8>, CanvasError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = canvas_mut(session, canvas_id)?;

    match &canvas.lock {
        Some(lock) if lock.holder != client_id => Err(CanvasError::NotHolder),
        _ => {
            canvas.lock = None;
            info!(%session_id, %canvas_id, holder = %client_id, "edit lock released");
            Ok(canvas.snapshot.clone())
        }
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Replace the canonical snapshot with an uploaded one. Total replacement —
/// the new image is swapped in whole or not at all, never merged with an
/// in-flight older snapshot.
///
/// # Errors
///
/// Returns `NotHolder` (silent) when the sender doesn't hold the lock, and
/// `BadSnapshot` for bytes that don't decode as a PNG.
pub async fn store_snapshot(
    state: &AppState,
    session_id: Uuid,
    canvas_id: Uuid,
    client_id: Uuid,
    png: Vec<u8>,
    now: Instant,
) -> Result<(), CanvasError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = canvas_mut(session, canvas_id)?;

    match &mut canvas.lock {
        Some(lock) if lock.holder == client_id => {
            // Undecodable bytes must never become canonical state — they
            // would be relayed, served to late joiners, and fail every
            // subsequent open of this canvas.
            Raster::decode_png(&png, canvas.base_color)?;
            lock.last_activity = now;
            canvas.snapshot = png;
            info!(%session_id, %canvas_id, bytes = canvas.snapshot.len(), "canonical snapshot replaced");
            Ok(())
        }
        _ => Err(CanvasError::NotHolder),
    }
}

/// Fetch the canonical snapshot, e.g. for a late joiner's targeted reload.
///
/// # Errors
///
/// Returns `Stale` if the canvas doesn't exist.
pub async fn fetch_snapshot(state: &AppState, session_id: Uuid, canvas_id: Uuid) -> Result<Vec<u8>, CanvasError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = session
        .canvases
        .get(&canvas_id)
        .ok_or(CanvasError::Stale(canvas_id))?;
    Ok(canvas.snapshot.clone())
}

// =============================================================================
// DELETE
// =============================================================================

/// Destroy a shared canvas. Refused while someone is editing it.
///
/// # Errors
///
/// Returns `Busy` while the edit lock is held, `Stale` if the canvas doesn't
/// exist.
pub async fn delete_canvas(state: &AppState, session_id: Uuid, canvas_id: Uuid) -> Result<(), CanvasError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(CanvasError::SessionNotLoaded(session_id))?;
    let canvas = canvas_mut(session, canvas_id)?;

    if let Some(lock) = &canvas.lock {
        return Err(CanvasError::Busy { holder: lock.holder });
    }

    session.canvases.remove(&canvas_id);
    info!(%session_id, %canvas_id, "deleted shared canvas");
    Ok(())
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
