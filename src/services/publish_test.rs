use uuid::Uuid;

use super::*;
use crate::color;
use crate::raster::BrushStyle;
use crate::state::test_helpers::{seed_session, test_app_state};

// Private note background chosen to be exact in 8-bit so PNG round trips
// don't drift outside the recolor tolerance.
const PRIVATE_BASE: Color = Color::opaque(0.8, 0.8, 0.4);

fn private_note_png() -> Vec<u8> {
    let mut raster = Raster::new(16, 16, PRIVATE_BASE);
    let style = BrushStyle::new(color::BLACK, 4);
    raster.paint(0.5, 0.5, &style);
    raster.encode_png().expect("test note should encode")
}

#[test]
fn recolor_swaps_background_and_keeps_strokes() {
    let png = private_note_png();
    let (raster, _recolored) =
        recolor_snapshot(&png, PRIVATE_BASE, SHARED_BASE_COLOR, 0.002).expect("recolor should succeed");

    // Corner pixel was background.
    assert!(raster.pixel(0, 0).approx_eq(SHARED_BASE_COLOR, 0.002));
    // Center pixel was painted and must survive untouched.
    assert!(raster.pixel(8, 8).approx_eq(color::BLACK, 0.002));
    assert_eq!(raster.base_color(), SHARED_BASE_COLOR);
}

#[test]
fn recolor_rejects_garbage() {
    let err = recolor_snapshot(b"not a png", PRIVATE_BASE, SHARED_BASE_COLOR, 0.002)
        .expect_err("garbage should not decode");
    assert!(matches!(err, RasterError::Decode(_)));
}

#[tokio::test]
async fn publish_registers_recolored_canvas() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;
    let png = private_note_png();

    let (canvas_id, width, height, recolored) = publish_canvas(&state, session_id, &png, PRIVATE_BASE)
        .await
        .expect("publish should succeed");
    assert_eq!((width, height), (16, 16));

    let sessions = state.sessions.read().await;
    let canvas = &sessions.get(&session_id).unwrap().canvases[&canvas_id];
    assert_eq!(canvas.base_color, SHARED_BASE_COLOR);
    assert_eq!(canvas.snapshot, recolored);
    assert!(canvas.lock.is_none());

    let check = Raster::decode_png(&canvas.snapshot, SHARED_BASE_COLOR).expect("stored snapshot should decode");
    assert!(check.pixel(0, 0).approx_eq(SHARED_BASE_COLOR, 0.002));
    assert!(check.pixel(8, 8).approx_eq(color::BLACK, 0.002));
}

#[tokio::test]
async fn failed_publish_registers_nothing() {
    let state = test_app_state();
    let session_id = seed_session(&state).await;

    let err = publish_canvas(&state, session_id, b"corrupt", PRIVATE_BASE)
        .await
        .expect_err("corrupt snapshot should be rejected");
    assert!(matches!(err, PublishError::BadSnapshot(_)));

    let sessions = state.sessions.read().await;
    assert!(sessions.get(&session_id).unwrap().canvases.is_empty());
}

#[tokio::test]
async fn publish_into_unknown_session_fails() {
    let state = test_app_state();
    let png = private_note_png();

    let err = publish_canvas(&state, Uuid::new_v4(), &png, PRIVATE_BASE)
        .await
        .expect_err("unknown session should fail");
    assert!(matches!(err, PublishError::SessionNotLoaded(_)));
}
