//! inkrelay — server-authoritative replication for shared session annotations.
//!
//! ARCHITECTURE
//! ============
//! Participants draw freehand 3D strokes and raster canvas notes. Every
//! communication is a [`frame::Frame`] exchanged over WebSocket. The server
//! holds the canonical state of all shared objects — point streams, canvas
//! snapshots, and edit locks — and relays accepted mutations to the other
//! participants in arrival order. Creators render locally without waiting for
//! the round trip; the relay excludes them so nothing is painted twice.
//!
//! The `local` module is the participant-side counterpart: private objects
//! that never touch the network, the pen and note editors that produce
//! outbound frames, and the replica that applies inbound ones.

pub mod color;
pub mod frame;
pub mod geom;
pub mod local;
pub mod raster;
pub mod routes;
pub mod services;
pub mod state;
