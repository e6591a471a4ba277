use uuid::Uuid;

use super::*;
use crate::color;
use crate::state::SHARED_BASE_COLOR;

#[test]
fn paint_marks_the_raster_over_the_private_base() {
    let mut note = NoteEditor::new(16);
    note.begin_segment();
    note.paint(0.5, 0.5);

    let raster = note.raster();
    assert!(raster.pixel(8, 8).approx_eq(color::BLACK, 0.002));
    assert!(raster.pixel(0, 0).approx_eq(PRIVATE_BASE_COLOR, 0.002));
}

#[test]
fn export_round_trips_through_png() {
    let mut note = NoteEditor::new(16);
    note.set_color(color::RED);
    note.paint(0.5, 0.5);

    let png = note.export_png().expect("note should encode");
    let decoded = Raster::decode_png(&png, PRIVATE_BASE_COLOR).expect("note should decode");
    assert!(decoded.pixel(8, 8).approx_eq(color::RED, 0.002));
}

#[test]
fn save_to_writes_a_timestamped_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let note = NoteEditor::new(8);

    let path = note.save_to(dir.path()).expect("save should succeed");
    let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
    assert!(name.starts_with("StickyNote_"));
    assert!(name.ends_with(".png"));
    assert!(path.exists());
}

#[test]
fn publish_is_non_destructive_until_confirmed() {
    let session_id = Uuid::new_v4();
    let mut note = NoteEditor::new(8);

    let req = note.publish_request(session_id).expect("publish request");
    assert_eq!(req.syscall, "canvas:publish");
    assert_eq!(req.session_id, Some(session_id));
    assert!(req.data_bytes("png").is_some());
    assert_eq!(req.data_value::<Color>("base_color"), Some(PRIVATE_BASE_COLOR));

    // Server never confirmed: the note survives.
    note.publish_failed();
    assert!(!note.is_destroyed());

    // Confirmation without a pending publish is a no-op.
    note.confirm_published();
    assert!(!note.is_destroyed());

    // Request again and confirm: now the private note goes away.
    note.publish_request(session_id).expect("publish request");
    note.confirm_published();
    assert!(note.is_destroyed());
}

#[test]
fn canvas_editor_paints_only_while_granted() {
    let session_id = Uuid::new_v4();
    let canvas_id = Uuid::new_v4();
    let snapshot = Raster::new(16, 16, SHARED_BASE_COLOR)
        .encode_png()
        .expect("snapshot should encode");
    let mut editor =
        CanvasEditor::open(session_id, canvas_id, &snapshot, SHARED_BASE_COLOR).expect("open");

    // Before the lock is granted, painting is inert.
    assert!(editor.paint(0.5, 0.5).is_empty());
    assert!(editor.raster().pixel(8, 8).approx_eq(SHARED_BASE_COLOR, 0.002));

    let edit = editor.edit_request();
    assert_eq!(edit.syscall, "canvas:edit");
    assert_eq!(edit.data_uuid("canvas_id"), Some(canvas_id));

    editor.granted();
    let frames = editor.paint(0.5, 0.5);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, "canvas:point");
    assert!(editor.raster().pixel(8, 8).approx_eq(color::BLACK, 0.002));
}

#[test]
fn canvas_editor_release_syncs_then_releases() {
    let session_id = Uuid::new_v4();
    let canvas_id = Uuid::new_v4();
    let snapshot = Raster::new(16, 16, SHARED_BASE_COLOR)
        .encode_png()
        .expect("snapshot should encode");
    let mut editor =
        CanvasEditor::open(session_id, canvas_id, &snapshot, SHARED_BASE_COLOR).expect("open");
    editor.granted();
    editor.set_color(color::BLUE);
    editor.paint(0.5, 0.5);

    let frames = editor.release().expect("release");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].syscall, "canvas:sync");
    assert_eq!(frames[1].syscall, "canvas:release");
    assert!(!editor.is_editing());

    // The final sync carries the edited pixels.
    let png = frames[0].data_bytes("png").expect("sync should carry the snapshot");
    let decoded = Raster::decode_png(&png, SHARED_BASE_COLOR).expect("sync snapshot should decode");
    assert!(decoded.pixel(8, 8).approx_eq(color::BLUE, 0.002));
}

#[test]
fn force_release_stops_editing() {
    let session_id = Uuid::new_v4();
    let canvas_id = Uuid::new_v4();
    let snapshot = Raster::new(8, 8, SHARED_BASE_COLOR)
        .encode_png()
        .expect("snapshot should encode");
    let mut editor =
        CanvasEditor::open(session_id, canvas_id, &snapshot, SHARED_BASE_COLOR).expect("open");
    editor.granted();

    editor.force_released();
    assert!(!editor.is_editing());
    assert!(editor.paint(0.5, 0.5).is_empty());
}
