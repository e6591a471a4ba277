//! Publish service — promote a private note to a shared canvas.
//!
//! DESIGN
//! ======
//! The spawn-with-initial-content request carries the private note's exported
//! PNG and its background color. The server recolors every pixel matching the
//! private background (within a channel tolerance — colors pass through 8-bit
//! encoding) to the shared theme, preserving drawn strokes, then registers the
//! shared canvas pre-populated with the recolored image.
//!
//! ERROR HANDLING
//! ==============
//! Nothing is registered until the recolored snapshot is ready, and the caller
//! destroys its private note only after the confirmation reply. A request that
//! never completes therefore loses no data; retry policy is the caller's.

use tracing::info;
use uuid::Uuid;

use crate::color::Color;
use crate::raster::{Raster, RasterError};
use crate::state::{AppState, SHARED_BASE_COLOR, SharedCanvas};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("session not loaded: {0}")]
    SessionNotLoaded(Uuid),
    #[error("snapshot rejected: {0}")]
    BadSnapshot(#[from] RasterError),
}

impl crate::frame::ErrorCode for PublishError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotLoaded(_) => "E_SESSION_NOT_LOADED",
            Self::BadSnapshot(_) => "E_BAD_SNAPSHOT",
        }
    }
}

/// Recolor a private snapshot's background to the shared theme.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be decoded or re-encoded.
pub fn recolor_snapshot(
    png: &[u8],
    private_base: Color,
    shared_base: Color,
    tolerance: f32,
) -> Result<(Raster, Vec<u8>), RasterError> {
    let mut raster = Raster::decode_png(png, private_base)?;
    raster.recolor_background(private_base, shared_base, tolerance);
    let recolored = raster.encode_png()?;
    Ok((raster, recolored))
}

/// Spawn a shared canvas pre-populated with a published private note.
/// Returns the new canvas id and the recolored snapshot for relay.
///
/// # Errors
///
/// Returns `BadSnapshot` for undecodable image data; in that case nothing is
/// registered and the caller's private note stays intact.
pub async fn publish_canvas(
    state: &AppState,
    session_id: Uuid,
    png: &[u8],
    private_base: Color,
) -> Result<(Uuid, u32, u32, Vec<u8>), PublishError> {
    // Decode and recolor before touching session state so a bad snapshot
    // leaves nothing half-created.
    let (raster, recolored) = recolor_snapshot(png, private_base, SHARED_BASE_COLOR, state.config.color_tolerance)?;

    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or(PublishError::SessionNotLoaded(session_id))?;

    let id = Uuid::new_v4();
    let (width, height) = (raster.width(), raster.height());
    session.canvases.insert(
        id,
        SharedCanvas {
            id,
            width,
            height,
            base_color: SHARED_BASE_COLOR,
            snapshot: recolored.clone(),
            lock: None,
        },
    );

    info!(%session_id, canvas_id = %id, width, height, "published private note as shared canvas");
    Ok((id, width, height, recolored))
}

#[cfg(test)]
#[path = "publish_test.rs"]
mod tests;
