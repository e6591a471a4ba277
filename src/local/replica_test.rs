use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::color;
use crate::frame::Data;
use crate::services::session::{CanvasSnapshot, StrokeSnapshot};

fn relay(syscall: &str, data: Data) -> Frame {
    Frame::request(syscall, data).with_session_id(Uuid::new_v4())
}

#[test]
fn join_reply_rebuilds_the_scene() {
    let mut replica = Replica::new(Uuid::new_v4());
    let stroke_id = Uuid::new_v4();
    let canvas_id = Uuid::new_v4();

    let strokes = vec![StrokeSnapshot {
        id: stroke_id,
        color: color::RED,
        width: 0.005,
        points: vec![Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0)],
        finalized: true,
    }];
    let canvases = vec![CanvasSnapshot {
        id: canvas_id,
        width: 16,
        height: 16,
        base_color: crate::state::SHARED_BASE_COLOR,
        png: match crate::frame::encode_bytes(&[1u8, 2, 3]) {
            serde_json::Value::String(s) => s,
            _ => String::new(),
        },
        locked: false,
    }];

    let mut data = Data::new();
    data.insert("strokes".into(), serde_json::to_value(strokes).unwrap());
    data.insert("canvases".into(), serde_json::to_value(canvases).unwrap());
    let reply = Frame::request("session:join", Data::new()).done_with(data);

    replica.apply(&reply);

    let stroke = &replica.strokes[&stroke_id];
    assert_eq!(stroke.color, color::RED);
    assert_eq!(stroke.points.len(), 2);
    assert!(stroke.finalized);
    assert!(stroke.bounds.is_some());

    let canvas = &replica.canvases[&canvas_id];
    assert_eq!(canvas.snapshot, vec![1u8, 2, 3]);
    assert!(canvas.locked_by.is_none());
}

#[test]
fn relayed_stroke_frames_build_a_peer_stroke_in_order() {
    let mut replica = Replica::new(Uuid::new_v4());
    let stroke_id = Uuid::new_v4();

    let mut start = Data::new();
    start.insert("stroke_id".into(), json!(stroke_id));
    start.insert("color".into(), serde_json::to_value(color::BLUE).unwrap());
    start.insert("width".into(), json!(0.01));
    replica.apply(&relay("stroke:start", start));

    let points = [
        Point::new(0.0, 0.0, 0.0),
        Point::new(0.5, 0.1, 0.0),
        Point::new(1.0, 0.2, 0.0),
    ];
    for p in points {
        let mut data = Data::new();
        data.insert("stroke_id".into(), json!(stroke_id));
        data.insert("point".into(), serde_json::to_value(p).unwrap());
        replica.apply(&relay("stroke:point", data));
    }

    let mut end = Data::new();
    end.insert("stroke_id".into(), json!(stroke_id));
    replica.apply(&relay("stroke:end", end));

    let stroke = &replica.strokes[&stroke_id];
    assert_eq!(stroke.color, color::BLUE);
    assert_eq!(stroke.points.as_slice(), &points);
    assert!(stroke.finalized);
}

#[test]
fn own_stroke_relays_are_ignored_but_deletes_apply() {
    let mut replica = Replica::new(Uuid::new_v4());
    let stroke_id = Uuid::new_v4();

    replica.register_own_stroke(stroke_id, color::BLACK, 0.005);
    replica.paint_own_point(stroke_id, Point::new(1.0, 1.0, 1.0));

    // An echoed point for an own stroke must not double paint.
    let mut data = Data::new();
    data.insert("stroke_id".into(), json!(stroke_id));
    data.insert("point".into(), serde_json::to_value(Point::new(9.0, 9.0, 9.0)).unwrap());
    replica.apply(&relay("stroke:point", data));
    assert_eq!(replica.strokes[&stroke_id].points.len(), 1);

    // A peer's delete gesture removes it like any other stroke.
    let mut data = Data::new();
    data.insert("stroke_id".into(), json!(stroke_id));
    replica.apply(&relay("stroke:delete", data));
    assert!(!replica.strokes.contains_key(&stroke_id));
    assert!(!replica.is_own_stroke(stroke_id));
}

#[test]
fn canvas_lifecycle_frames_update_the_local_copy() {
    let mut replica = Replica::new(Uuid::new_v4());
    let canvas_id = Uuid::new_v4();
    let holder = Uuid::new_v4();

    let mut create = Data::new();
    create.insert("canvas_id".into(), json!(canvas_id));
    create.insert("width".into(), json!(16));
    create.insert("height".into(), json!(16));
    create.insert(
        "base_color".into(),
        serde_json::to_value(crate::state::SHARED_BASE_COLOR).unwrap(),
    );
    create.insert("png".into(), crate::frame::encode_bytes(&[7u8]));
    replica.apply(&relay("canvas:create", create));
    assert_eq!(replica.canvases[&canvas_id].snapshot, vec![7u8]);

    let mut locked = Data::new();
    locked.insert("canvas_id".into(), json!(canvas_id));
    locked.insert("holder".into(), json!(holder));
    replica.apply(&relay("canvas:locked", locked));
    assert_eq!(replica.canvases[&canvas_id].locked_by, Some(holder));

    let mut sync = Data::new();
    sync.insert("canvas_id".into(), json!(canvas_id));
    sync.insert("png".into(), crate::frame::encode_bytes(&[8u8, 8]));
    replica.apply(&relay("canvas:sync", sync));
    assert_eq!(replica.canvases[&canvas_id].snapshot, vec![8u8, 8]);
    assert_eq!(replica.canvases[&canvas_id].locked_by, Some(holder));

    let mut release = Data::new();
    release.insert("canvas_id".into(), json!(canvas_id));
    release.insert("png".into(), crate::frame::encode_bytes(&[9u8]));
    replica.apply(&relay("canvas:release", release));
    assert_eq!(replica.canvases[&canvas_id].snapshot, vec![9u8]);
    assert!(replica.canvases[&canvas_id].locked_by.is_none());

    let mut delete = Data::new();
    delete.insert("canvas_id".into(), json!(canvas_id));
    replica.apply(&relay("canvas:delete", delete));
    assert!(replica.canvases.is_empty());
}

#[test]
fn unknown_frames_are_ignored() {
    let mut replica = Replica::new(Uuid::new_v4());
    replica.apply(&relay("cursor:moved", Data::new()));
    replica.apply(&relay("stroke:point", Data::new()));
    assert!(replica.strokes.is_empty());
    assert!(replica.canvases.is_empty());
}
