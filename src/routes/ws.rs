//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Relay frames from session peers → forward to client
//!
//! Handler functions are pure business logic — they validate, mutate canonical
//! state, and return an `Outcome`. The dispatch layer owns all outbound
//! concerns: reply to sender, relay to peers, targeted delivery.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / relay / both / nothing)
//! 4. Close → broadcast `session:part` → cleanup

use std::time::Instant;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::color::Color;
use crate::frame::{self, Data, Frame};
use crate::geom::Point;
use crate::services;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Broadcast done+data to ALL session clients including sender.
    /// Sender's copy carries `parent_id` for correlation.
    Broadcast(Data),
    /// Relay data to all session peers EXCLUDING sender. No reply to sender —
    /// used for stroke traffic, where the creator already rendered locally.
    RelayToPeers(Data),
    /// Send done+data to sender only (targeted delivery).
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// Send nothing at all. Stale references and non-holder pings land here.
    Silent,
    /// Reply to sender with one payload, relay a differently-named
    /// notification to peers (e.g. `canvas:publish` reply + `canvas:create`).
    ReplyAndRelay {
        reply: Data,
        relay_syscall: String,
        relay: Data,
    },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving relay frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    // Track which session this client has joined.
    let mut current_session: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let frames = process_inbound_text(&state, &mut current_session, client_id, &client_tx, &text).await;
                        for f in frames {
                            let _ = send_frame(&mut socket, &f).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Broadcast session:part to peers BEFORE cleanup (part_session may evict
    // the session). Shared objects survive — only the client entry goes away.
    if let Some(session_id) = current_session {
        let part = Frame::request("session:part", Data::new())
            .with_session_id(session_id)
            .with_data("client_id", client_id.to_string());
        services::session::broadcast(&state, session_id, &part, Some(client_id)).await;

        services::session::part_session(&state, session_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and relay behavior end-to-end.
async fn process_inbound_text(
    state: &AppState,
    current_session: &mut Option<Uuid>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new())
                .with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the connection's client_id as `from`; never trust the wire value.
    req.from = Some(client_id.to_string());

    let prefix = req.prefix();
    if !is_point_flood(&req.syscall) {
        info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");
    }

    let result = match prefix {
        "session" => handle_session(state, current_session, client_id, client_tx, &req).await,
        "stroke" => handle_stroke(state, *current_session, client_id, &req).await,
        "canvas" => handle_canvas(state, *current_session, client_id, &req).await,
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    let session_id = *current_session;
    match result {
        Ok(Outcome::Broadcast(data)) => {
            let sender_frame = req.done_with(data);
            // Peers get a copy without parent_id (they didn't originate it).
            let mut peer_frame = sender_frame.clone();
            peer_frame.id = Uuid::new_v4();
            peer_frame.parent_id = None;
            peer_frame.status = crate::frame::Status::Request;
            if let Some(sid) = session_id {
                services::session::broadcast(state, sid, &peer_frame, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Ok(Outcome::RelayToPeers(data)) => {
            if let Some(sid) = session_id {
                let relay = Frame::request(&req.syscall, data)
                    .with_session_id(sid)
                    .with_from(client_id.to_string());
                services::session::broadcast(state, sid, &relay, Some(client_id)).await;
            }
            vec![]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done_with(data)]
        }
        Ok(Outcome::Done) => {
            vec![req.done()]
        }
        Ok(Outcome::Silent) => {
            vec![]
        }
        Ok(Outcome::ReplyAndRelay { reply, relay_syscall, relay }) => {
            let sender_frame = req.done_with(reply);
            if let Some(sid) = session_id {
                let notif = Frame::request(relay_syscall, relay)
                    .with_session_id(sid)
                    .with_from(client_id.to_string());
                services::session::broadcast(state, sid, &notif, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

async fn handle_session(
    state: &AppState,
    current_session: &mut Option<Uuid>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let Some(session_id) = req.session_id.or_else(|| req.data_uuid("session_id")) else {
                return Err(req.error("session_id required"));
            };

            // Part the current session if already joined. Its peers get the
            // same part notice the disconnect path sends, so presence views
            // never go stale on a session switch.
            if let Some(old) = current_session.take() {
                let part = Frame::request("session:part", Data::new())
                    .with_session_id(old)
                    .with_data("client_id", client_id.to_string());
                services::session::broadcast(state, old, &part, Some(client_id)).await;
                services::session::part_session(state, old, client_id).await;
            }

            let snapshot =
                services::session::join_session(state, session_id, client_id, client_tx.clone()).await;
            *current_session = Some(session_id);

            let mut reply = Data::new();
            reply.insert("strokes".into(), serde_json::to_value(&snapshot.strokes).unwrap_or_default());
            reply.insert(
                "canvases".into(),
                serde_json::to_value(&snapshot.canvases).unwrap_or_default(),
            );

            let mut relay = Data::new();
            relay.insert("client_id".into(), serde_json::json!(client_id));

            Ok(Outcome::ReplyAndRelay { reply, relay_syscall: req.syscall.clone(), relay })
        }
        op => Err(req.error(format!("unknown session op: {op}"))),
    }
}

// =============================================================================
// STROKE HANDLERS
// =============================================================================

async fn handle_stroke(
    state: &AppState,
    current_session: Option<Uuid>,
    client_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(session_id) = current_session else {
        return Err(req.error("must join a session first"));
    };

    match req.op() {
        "spawn" => match services::stroke::spawn_stroke(state, session_id, client_id).await {
            // Targeted delivery: the object id goes to the requester only.
            Ok(Some(stroke_id)) => {
                let mut data = Data::new();
                data.insert("stroke_id".into(), serde_json::json!(stroke_id));
                Ok(Outcome::Reply(data))
            }
            // Debounced: requester already owns an unfinished stroke.
            Ok(None) => Ok(Outcome::Done),
            Err(e) => Err(req.error_from(&e)),
        },
        "start" => {
            let Some(stroke_id) = req.data_uuid("stroke_id") else {
                return Err(req.error("stroke_id required"));
            };
            let Some(color) = req.data_value::<Color>("color") else {
                return Err(req.error("color required"));
            };
            let Some(width) = req.data_f32("width") else {
                return Err(req.error("width required"));
            };

            match services::stroke::start_stroke(state, session_id, stroke_id, client_id, color, width).await
            {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("stroke_id".into(), serde_json::json!(stroke_id));
                    data.insert("color".into(), serde_json::to_value(color).unwrap_or_default());
                    data.insert("width".into(), serde_json::json!(width));
                    Ok(Outcome::RelayToPeers(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "point" => {
            let Some(stroke_id) = req.data_uuid("stroke_id") else {
                return Err(req.error("stroke_id required"));
            };
            let Some(point) = req.data_value::<Point>("point") else {
                return Err(req.error("point required"));
            };

            match services::stroke::append_point(state, session_id, stroke_id, client_id, point).await {
                // Relay to all except the creator: they already painted
                // locally via the fast path and must not repaint.
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("stroke_id".into(), serde_json::json!(stroke_id));
                    data.insert("point".into(), serde_json::to_value(point).unwrap_or_default());
                    Ok(Outcome::RelayToPeers(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "end" => {
            let Some(stroke_id) = req.data_uuid("stroke_id") else {
                return Err(req.error("stroke_id required"));
            };

            match services::stroke::end_stroke(state, session_id, stroke_id, client_id).await {
                Ok(bounds) => {
                    let mut data = Data::new();
                    data.insert("stroke_id".into(), serde_json::json!(stroke_id));
                    if let Some(bounds) = bounds {
                        data.insert("bounds".into(), serde_json::to_value(bounds).unwrap_or_default());
                    }
                    Ok(Outcome::RelayToPeers(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => {
            let Some(stroke_id) = req.data_uuid("stroke_id") else {
                return Err(req.error("stroke_id required"));
            };

            match services::stroke::delete_stroke(state, session_id, stroke_id).await {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("stroke_id".into(), serde_json::json!(stroke_id));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown stroke op: {op}"))),
    }
}

// =============================================================================
// CANVAS HANDLERS
// =============================================================================

#[allow(clippy::too_many_lines)]
async fn handle_canvas(
    state: &AppState,
    current_session: Option<Uuid>,
    client_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(session_id) = current_session else {
        return Err(req.error("must join a session first"));
    };

    match req.op() {
        "publish" => {
            let Some(png) = req.data_bytes("png") else {
                return Err(req.error("png required"));
            };
            let Some(private_base) = req.data_value::<Color>("base_color") else {
                return Err(req.error("base_color required"));
            };

            match services::publish::publish_canvas(state, session_id, &png, private_base).await {
                Ok((canvas_id, width, height, recolored)) => {
                    // Reply confirms the publish; only then may the requester
                    // destroy its private note.
                    let mut reply = Data::new();
                    reply.insert("canvas_id".into(), serde_json::json!(canvas_id));
                    reply.insert("width".into(), serde_json::json!(width));
                    reply.insert("height".into(), serde_json::json!(height));
                    reply.insert("png".into(), frame::encode_bytes(&recolored));

                    let mut relay = reply.clone();
                    relay.insert(
                        "base_color".into(),
                        serde_json::to_value(crate::state::SHARED_BASE_COLOR).unwrap_or_default(),
                    );

                    Ok(Outcome::ReplyAndRelay {
                        reply,
                        relay_syscall: "canvas:create".into(),
                        relay,
                    })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "edit" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };

            match services::canvas::acquire_lock(state, session_id, canvas_id, client_id, Instant::now())
                .await
            {
                Ok(()) => {
                    let mut reply = Data::new();
                    reply.insert("canvas_id".into(), serde_json::json!(canvas_id));

                    let mut relay = reply.clone();
                    relay.insert("holder".into(), serde_json::json!(client_id));

                    Ok(Outcome::ReplyAndRelay {
                        reply,
                        relay_syscall: "canvas:locked".into(),
                        relay,
                    })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "point" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };

            // Activity ping only — pixels travel in canvas:sync snapshots.
            match services::canvas::paint_activity(state, session_id, canvas_id, client_id, Instant::now())
                .await
            {
                Ok(()) => Ok(Outcome::Silent),
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "sync" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };
            let Some(png) = req.data_bytes("png") else {
                return Err(req.error("png required"));
            };

            match services::canvas::store_snapshot(
                state,
                session_id,
                canvas_id,
                client_id,
                png.clone(),
                Instant::now(),
            )
            .await
            {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("canvas_id".into(), serde_json::json!(canvas_id));
                    data.insert("png".into(), frame::encode_bytes(&png));
                    Ok(Outcome::RelayToPeers(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "release" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };

            match services::canvas::release_lock(state, session_id, canvas_id, client_id).await {
                // Everyone converges on the canonical snapshot — this covers
                // any per-point messages peers never saw.
                Ok(snapshot) => {
                    let mut data = Data::new();
                    data.insert("canvas_id".into(), serde_json::json!(canvas_id));
                    data.insert("png".into(), frame::encode_bytes(&snapshot));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "fetch" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };

            match services::canvas::fetch_snapshot(state, session_id, canvas_id).await {
                Ok(snapshot) => {
                    let mut data = Data::new();
                    data.insert("canvas_id".into(), serde_json::json!(canvas_id));
                    data.insert("png".into(), frame::encode_bytes(&snapshot));
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => {
            let Some(canvas_id) = req.data_uuid("canvas_id") else {
                return Err(req.error("canvas_id required"));
            };

            match services::canvas::delete_canvas(state, session_id, canvas_id).await {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("canvas_id".into(), serde_json::json!(canvas_id));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Silent),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown canvas op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// High-frequency point traffic is excluded from per-frame logging.
fn is_point_flood(syscall: &str) -> bool {
    matches!(syscall, "stroke:point" | "canvas:point")
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if !is_point_flood(&frame.syscall) {
        if frame.status == crate::frame::Status::Error {
            let code = frame.data_str(crate::frame::FRAME_CODE).unwrap_or("-");
            let message = frame.data_str(crate::frame::FRAME_MESSAGE).unwrap_or("-");
            warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
        } else {
            info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
        }
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
