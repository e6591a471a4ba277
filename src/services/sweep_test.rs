use std::time::{Duration, Instant};

use uuid::Uuid;

use super::*;
use crate::services::canvas;
use crate::state::test_helpers::{attach_client, seed_canvas, seed_session, test_app_state};

#[tokio::test]
async fn expired_lock_is_force_released_and_announced() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();
    let peer = Uuid::new_v4();
    let mut holder_rx = attach_client(&state, session_id, holder).await;
    let mut peer_rx = attach_client(&state, session_id, peer).await;

    let acquired_at = Instant::now();
    canvas::acquire_lock(&state, session_id, canvas_id, holder, acquired_at)
        .await
        .unwrap();

    sweep_once(&state, acquired_at + state.config.lock_timeout + Duration::from_secs(1)).await;

    // The lock is gone and the canvas can be claimed again.
    canvas::acquire_lock(&state, session_id, canvas_id, peer, Instant::now())
        .await
        .expect("swept canvas should be claimable");

    // The stale holder gets a targeted force-release before the broadcast.
    let notice = holder_rx.recv().await.expect("holder should be notified");
    assert_eq!(notice.syscall, "canvas:force_release");
    assert_eq!(notice.data_uuid("canvas_id"), Some(canvas_id));

    let release = holder_rx.recv().await.expect("holder also sees the broadcast");
    assert_eq!(release.syscall, "canvas:release");

    // Peers see only the release carrying the canonical snapshot.
    let release = peer_rx.recv().await.expect("peer should see the release");
    assert_eq!(release.syscall, "canvas:release");
    assert_eq!(release.data_uuid("canvas_id"), Some(canvas_id));
    assert!(release.data_bytes("png").is_some_and(|png| !png.is_empty()));
    assert!(peer_rx.try_recv().is_err());
}

#[tokio::test]
async fn active_lock_survives_the_sweep() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();
    let mut holder_rx = attach_client(&state, session_id, holder).await;

    let acquired_at = Instant::now();
    canvas::acquire_lock(&state, session_id, canvas_id, holder, acquired_at)
        .await
        .unwrap();

    // Paint traffic keeps refreshing activity past the original deadline.
    let painted_at = acquired_at + state.config.lock_timeout;
    canvas::paint_activity(&state, session_id, canvas_id, holder, painted_at)
        .await
        .unwrap();

    sweep_once(&state, acquired_at + state.config.lock_timeout + Duration::from_secs(1)).await;

    assert!(holder_rx.try_recv().is_err());
    let err = canvas::acquire_lock(&state, session_id, canvas_id, Uuid::new_v4(), Instant::now())
        .await
        .expect_err("lock should still be held");
    assert!(matches!(err, canvas::CanvasError::Busy { .. }));
}

#[tokio::test]
async fn sweep_with_no_locks_is_a_no_op() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    seed_canvas(&state, session_id).await;
    let client = Uuid::new_v4();
    let mut rx = attach_client(&state, session_id, client).await;

    sweep_once(&state, Instant::now() + Duration::from_secs(600)).await;
    assert!(rx.try_recv().is_err());
}
