//! Domain services used by the websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the canonical-state mutations so route handlers can
//! stay focused on protocol translation and relay plumbing.

pub mod canvas;
pub mod publish;
pub mod session;
pub mod stroke;
pub mod sweep;
