//! Lock sweep — background reclamation of abandoned edit locks.
//!
//! DESIGN
//! ======
//! A holder that crashes or walks away would otherwise pin a canvas forever.
//! The sweep scans all sessions on an interval and force-releases any lock
//! whose last activity is older than the configured timeout. Per-point paint
//! traffic refreshes activity, so an actively drawing holder is never swept.
//!
//! Expired locks are collected under the write lock first, then notifications
//! go out after it is dropped so channel sends never hold the session map.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{self, Data, Frame};
use crate::services::session;
use crate::state::AppState;

/// One force-released lock, snapshotted for post-lock notification.
struct ExpiredLock {
    session_id: Uuid,
    canvas_id: Uuid,
    holder: Uuid,
    snapshot: Vec<u8>,
}

/// Spawn the periodic lock sweep. Runs for the life of the server.
pub fn spawn_lock_sweep(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_ms = state.config.sweep_interval.as_millis(),
            timeout_secs = state.config.lock_timeout.as_secs(),
            "lock sweep started"
        );

        loop {
            ticker.tick().await;
            sweep_once(&state, Instant::now()).await;
        }
    })
}

/// Run one sweep pass: release expired locks, then notify participants.
/// Exposed separately so tests can drive it with a synthetic clock.
pub async fn sweep_once(state: &AppState, now: Instant) {
    let expired = release_expired(state, now).await;

    for lock in expired {
        warn!(
            session_id = %lock.session_id,
            canvas_id = %lock.canvas_id,
            holder = %lock.holder,
            "edit lock expired, force-releasing"
        );

        // The stale holder gets a targeted notice to stop painting locally.
        let notice = Frame::request("canvas:force_release", Data::new())
            .with_session_id(lock.session_id)
            .with_data("canvas_id", lock.canvas_id.to_string());
        session::send_to(state, lock.session_id, lock.holder, &notice).await;

        // Everyone converges on the last canonical snapshot, exactly as if
        // the holder had released normally.
        let release = Frame::request("canvas:release", Data::new())
            .with_session_id(lock.session_id)
            .with_data("canvas_id", lock.canvas_id.to_string())
            .with_data("png", frame::encode_bytes(&lock.snapshot));
        session::broadcast(state, lock.session_id, &release, None).await;
    }
}

async fn release_expired(state: &AppState, now: Instant) -> Vec<ExpiredLock> {
    let timeout = state.config.lock_timeout;
    let mut expired = Vec::new();

    let mut sessions = state.sessions.write().await;
    for (session_id, session) in sessions.iter_mut() {
        for canvas in session.canvases.values_mut() {
            let Some(lock) = &canvas.lock else {
                continue;
            };
            if now.duration_since(lock.last_activity) < timeout {
                continue;
            }
            expired.push(ExpiredLock {
                session_id: *session_id,
                canvas_id: canvas.id,
                holder: lock.holder,
                snapshot: canvas.snapshot.clone(),
            });
            canvas.lock = None;
        }
    }

    expired
}

#[cfg(test)]
#[path = "sweep_test.rs"]
mod tests;
