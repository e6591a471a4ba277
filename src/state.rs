//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the live annotation sessions. Each session owns the canonical state
//! of its shared objects — stroke point streams, canvas snapshots, and edit
//! locks — plus the connected clients' outbound channels. The server is the
//! sole mutator of canonical state; participants only mutate their local
//! render copies.
//!
//! A session's lifetime is tied to the session, not to any connection: shared
//! objects survive their creator's disconnect. Only a session with no objects
//! and no clients is evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::color::{CHANNEL_TOLERANCE, Color};
use crate::frame::Frame;
use crate::geom::{Bounds, PointStream};
use crate::raster::DEFAULT_RESOLUTION;

const DEFAULT_EDIT_LOCK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOCK_SWEEP_INTERVAL_MS: u64 = 5000;

/// Background color applied to every shared canvas. Private-note backgrounds
/// are recolored to this on publish.
pub const SHARED_BASE_COLOR: Color = Color::opaque(1.0, 0.8, 0.2);

// =============================================================================
// CONFIG
// =============================================================================

/// Server tuning knobs, loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Inactivity threshold after which a held edit lock is force-released.
    pub lock_timeout: Duration,
    /// How often the lock sweep task scans for expired locks.
    pub sweep_interval: Duration,
    /// Square resolution of newly spawned shared canvases.
    pub canvas_resolution: u32,
    /// Per-channel tolerance for background recoloring on publish.
    pub color_tolerance: f32,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lock_timeout: Duration::from_secs(env_parse(
                "EDIT_LOCK_TIMEOUT_SECS",
                DEFAULT_EDIT_LOCK_TIMEOUT_SECS,
            )),
            sweep_interval: Duration::from_millis(env_parse(
                "LOCK_SWEEP_INTERVAL_MS",
                DEFAULT_LOCK_SWEEP_INTERVAL_MS,
            )),
            canvas_resolution: env_parse("CANVAS_RESOLUTION", DEFAULT_RESOLUTION),
            color_tolerance: CHANNEL_TOLERANCE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(DEFAULT_EDIT_LOCK_TIMEOUT_SECS),
            sweep_interval: Duration::from_millis(DEFAULT_LOCK_SWEEP_INTERVAL_MS),
            canvas_resolution: DEFAULT_RESOLUTION,
            color_tolerance: CHANNEL_TOLERANCE,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// SHARED OBJECTS
// =============================================================================

/// Canonical state of a shared stroke. The stream is append-only and frozen
/// once the stroke ends; bounds grow incrementally per accepted point.
#[derive(Debug, Clone)]
pub struct SharedStroke {
    pub id: Uuid,
    /// Creator's client id. Advisory routing metadata only — the stroke is
    /// not destroyed when its owner disconnects.
    pub owner: Uuid,
    pub color: Color,
    pub width: f32,
    pub stream: PointStream,
    pub bounds: Option<Bounds>,
}

impl SharedStroke {
    #[must_use]
    pub fn new(id: Uuid, owner: Uuid) -> Self {
        Self {
            id,
            owner,
            color: crate::color::BLACK,
            width: 0.0,
            stream: PointStream::new(),
            bounds: None,
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.stream.is_frozen()
    }
}

/// Per-canvas mutual-exclusion token. At most one holder; reclaimed only by
/// explicit release or the inactivity sweep.
#[derive(Debug, Clone, Copy)]
pub struct EditLock {
    pub holder: Uuid,
    pub last_activity: Instant,
}

/// Canonical state of a shared canvas. The snapshot is a whole PNG image,
/// replaced atomically by uploads and never merged pixel-by-pixel.
#[derive(Debug, Clone)]
pub struct SharedCanvas {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub base_color: Color,
    pub snapshot: Vec<u8>,
    pub lock: Option<EditLock>,
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Per-session live state: the annotation session's shared objects plus the
/// connected clients' outbound frame channels.
pub struct SessionState {
    pub strokes: HashMap<Uuid, SharedStroke>,
    pub canvases: HashMap<Uuid, SharedCanvas>,
    /// Connected clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self { strokes: HashMap::new(), canvases: HashMap::new(), clients: HashMap::new() }
    }

    #[must_use]
    pub fn has_objects(&self) -> bool {
        !self.strokes.is_empty() || !self.canvases.is_empty()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — the session map is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionState>>>,
    pub config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
