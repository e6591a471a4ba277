//! Session service — join/part, broadcast, and targeted delivery.
//!
//! DESIGN
//! ======
//! Sessions are created on demand when the first participant joins. A joining
//! participant receives a full snapshot of every live shared object, which is
//! how late joiners reconstruct history. Parting only evicts the session when
//! no clients remain *and* it holds no objects — shared annotations outlive
//! their creators' connections.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::color::Color;
use crate::frame::{self, Frame};
use crate::geom::Point;
use crate::state::{AppState, SessionState};

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Wire form of one shared stroke, replayed in order by late joiners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrokeSnapshot {
    pub id: Uuid,
    pub color: Color,
    pub width: f32,
    pub points: Vec<Point>,
    pub finalized: bool,
}

/// Wire form of one shared canvas: the canonical PNG snapshot plus lock state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub base_color: Color,
    /// Base64-encoded canonical PNG.
    pub png: String,
    pub locked: bool,
}

/// Everything a late joiner needs to reconstruct the session scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub strokes: Vec<StrokeSnapshot>,
    pub canvases: Vec<CanvasSnapshot>,
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a session, creating it on demand. Registers the client's outbound
/// channel and returns the current object snapshot.
pub async fn join_session(
    state: &AppState,
    session_id: Uuid,
    client_id: Uuid,
    tx: mpsc::Sender<Frame>,
) -> SessionSnapshot {
    let mut sessions = state.sessions.write().await;
    let session = sessions.entry(session_id).or_insert_with(SessionState::new);
    session.clients.insert(client_id, tx);

    let snapshot = snapshot_session(session);
    info!(
        %session_id,
        %client_id,
        clients = session.clients.len(),
        strokes = snapshot.strokes.len(),
        canvases = snapshot.canvases.len(),
        "client joined session"
    );
    snapshot
}

/// Leave a session. The session is evicted only when it has no remaining
/// clients and no live objects; objects keep a session alive indefinitely.
pub async fn part_session(state: &AppState, session_id: Uuid, client_id: Uuid) {
    let mut sessions = state.sessions.write().await;
    let Some(session) = sessions.get_mut(&session_id) else {
        return;
    };

    session.clients.remove(&client_id);
    info!(%session_id, %client_id, remaining = session.clients.len(), "client left session");

    if session.clients.is_empty() && !session.has_objects() {
        sessions.remove(&session_id);
        info!(%session_id, "evicted empty session");
    }
}

fn snapshot_session(session: &SessionState) -> SessionSnapshot {
    let strokes = session
        .strokes
        .values()
        .map(|s| StrokeSnapshot {
            id: s.id,
            color: s.color,
            width: s.width,
            points: s.stream.points().to_vec(),
            finalized: s.is_finalized(),
        })
        .collect();

    let canvases = session
        .canvases
        .values()
        .map(|c| CanvasSnapshot {
            id: c.id,
            width: c.width,
            height: c.height,
            base_color: c.base_color,
            png: match frame::encode_bytes(&c.snapshot) {
                serde_json::Value::String(s) => s,
                _ => String::new(),
            },
            locked: c.lock.is_some(),
        })
        .collect();

    SessionSnapshot { strokes, canvases }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Broadcast a frame to all clients in a session, optionally excluding one.
pub async fn broadcast(state: &AppState, session_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let sessions = state.sessions.read().await;
    let Some(session) = sessions.get(&session_id) else {
        return;
    };

    for (client_id, tx) in &session.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

/// Targeted delivery: send a frame to exactly one client. This is the
/// point-to-point path used for spawn replies and force-release notices —
/// deliberately not a broadcast.
pub async fn send_to(state: &AppState, session_id: Uuid, client_id: Uuid, frame: &Frame) {
    let sessions = state.sessions.read().await;
    let Some(session) = sessions.get(&session_id) else {
        return;
    };
    if let Some(tx) = session.clients.get(&client_id) {
        let _ = tx.try_send(frame.clone());
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
