use std::time::Instant;

use uuid::Uuid;

use super::*;
use crate::color;
use crate::frame::ErrorCode;
use crate::state::SHARED_BASE_COLOR;
use crate::state::test_helpers::{seed_canvas, seed_session, test_app_state};

#[tokio::test]
async fn lock_is_exclusive_until_released() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let now = Instant::now();

    acquire_lock(&state, session_id, canvas_id, first, now)
        .await
        .expect("idle lock should be granted");

    let err = acquire_lock(&state, session_id, canvas_id, second, now)
        .await
        .expect_err("held lock should refuse a second holder");
    match err {
        CanvasError::Busy { holder } => assert_eq!(holder, first),
        other => panic!("expected Busy, got {other:?}"),
    }
    assert!(err.retryable());

    release_lock(&state, session_id, canvas_id, first)
        .await
        .expect("holder release should succeed");
    acquire_lock(&state, session_id, canvas_id, second, now)
        .await
        .expect("released lock should be grantable again");
}

#[tokio::test]
async fn paint_activity_is_holder_only() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();
    let now = Instant::now();

    acquire_lock(&state, session_id, canvas_id, holder, now).await.unwrap();

    paint_activity(&state, session_id, canvas_id, holder, now)
        .await
        .expect("holder paint should refresh activity");

    let err = paint_activity(&state, session_id, canvas_id, Uuid::new_v4(), now)
        .await
        .expect_err("non-holder paint should be refused");
    assert!(matches!(err, CanvasError::NotHolder));
    assert!(err.is_silent());
}

#[tokio::test]
async fn release_is_idempotent_after_force_release() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();

    // No lock held at all: treated as already released.
    let snapshot = release_lock(&state, session_id, canvas_id, holder)
        .await
        .expect("release without lock should be a no-op");
    assert!(!snapshot.is_empty());
}

#[tokio::test]
async fn release_by_non_holder_is_refused() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();

    acquire_lock(&state, session_id, canvas_id, holder, Instant::now()).await.unwrap();

    let err = release_lock(&state, session_id, canvas_id, Uuid::new_v4())
        .await
        .expect_err("non-holder release should be refused");
    assert!(matches!(err, CanvasError::NotHolder));

    // The lock is still held.
    let err = acquire_lock(&state, session_id, canvas_id, Uuid::new_v4(), Instant::now())
        .await
        .expect_err("lock should still be held");
    assert!(matches!(err, CanvasError::Busy { .. }));
}

#[tokio::test]
async fn store_snapshot_replaces_canonical_bytes() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();
    let now = Instant::now();

    acquire_lock(&state, session_id, canvas_id, holder, now).await.unwrap();

    let uploaded = Raster::new(8, 8, color::BLUE)
        .encode_png()
        .expect("upload should encode");
    store_snapshot(&state, session_id, canvas_id, holder, uploaded.clone(), now)
        .await
        .expect("holder upload should succeed");

    let fetched = fetch_snapshot(&state, session_id, canvas_id).await.unwrap();
    assert_eq!(fetched, uploaded);
}

#[tokio::test]
async fn store_snapshot_rejects_undecodable_bytes() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();
    let now = Instant::now();

    acquire_lock(&state, session_id, canvas_id, holder, now).await.unwrap();

    let err = store_snapshot(&state, session_id, canvas_id, holder, b"not a png".to_vec(), now)
        .await
        .expect_err("garbage upload should be rejected");
    assert!(matches!(err, CanvasError::BadSnapshot(_)));
    assert!(!err.is_silent());

    // The canonical snapshot is untouched and still decodes.
    let fetched = fetch_snapshot(&state, session_id, canvas_id).await.unwrap();
    assert_ne!(fetched, b"not a png".to_vec());
    assert!(Raster::decode_png(&fetched, SHARED_BASE_COLOR).is_ok());
}

#[tokio::test]
async fn store_snapshot_requires_the_lock() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;

    let err = store_snapshot(&state, session_id, canvas_id, Uuid::new_v4(), vec![9u8], Instant::now())
        .await
        .expect_err("upload without the lock should be refused");
    assert!(matches!(err, CanvasError::NotHolder));

    // The seeded snapshot is untouched.
    let fetched = fetch_snapshot(&state, session_id, canvas_id).await.unwrap();
    assert_ne!(fetched, vec![9u8]);
}

#[tokio::test]
async fn delete_refused_while_locked() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let canvas_id = seed_canvas(&state, session_id).await;
    let holder = Uuid::new_v4();

    acquire_lock(&state, session_id, canvas_id, holder, Instant::now()).await.unwrap();

    let err = delete_canvas(&state, session_id, canvas_id)
        .await
        .expect_err("delete of a locked canvas should be refused");
    assert!(matches!(err, CanvasError::Busy { .. }));

    release_lock(&state, session_id, canvas_id, holder).await.unwrap();
    delete_canvas(&state, session_id, canvas_id)
        .await
        .expect("delete after release should succeed");

    let err = fetch_snapshot(&state, session_id, canvas_id)
        .await
        .expect_err("deleted canvas should be stale");
    assert!(matches!(err, CanvasError::Stale(_)));
}
