//! RGBA color with float channels.
//!
//! Colors cross the wire as JSON floats and round-trip through 8-bit PNG
//! encoding, so equality checks during background recoloring use a per-channel
//! tolerance rather than exact comparison.

use serde::{Deserialize, Serialize};

/// Per-channel tolerance for background matching. An 8-bit round trip moves a
/// channel by at most 1/510, which stays inside this window.
pub const CHANNEL_TOLERANCE: f32 = 0.002;

/// An RGBA color with channels in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

pub const BLACK: Color = Color::opaque(0.0, 0.0, 0.0);
pub const RED: Color = Color::opaque(1.0, 0.0, 0.0);
pub const GREEN: Color = Color::opaque(0.0, 1.0, 0.0);
pub const BLUE: Color = Color::opaque(0.0, 0.0, 1.0);
pub const WHITE: Color = Color::opaque(1.0, 1.0, 1.0);

impl Color {
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Per-channel comparison within `tolerance`. Alpha is ignored: the
    /// background match only cares about the visible color.
    #[must_use]
    pub fn approx_eq(&self, other: Color, tolerance: f32) -> bool {
        (self.r - other.r).abs() <= tolerance
            && (self.g - other.g).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
    }

    #[must_use]
    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [quantize(self.r), quantize(self.g), quantize(self.b), quantize(self.a)]
    }

    #[must_use]
    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self {
            r: f32::from(px[0]) / 255.0,
            g: f32::from(px[1]) / 255.0,
            b: f32::from(px[2]) / 255.0,
            a: f32::from(px[3]) / 255.0,
        }
    }

    /// Muted variant used for private-object rendering: saturated colors lose
    /// saturation, dark colors are lightened. Keeps private annotations
    /// visually distinct from their shared counterparts.
    #[must_use]
    pub fn muted(self) -> Self {
        let (h, s, v) = self.to_hsv();
        let (s, v) = if s > 0.5 { (0.4, v) } else { (s, 0.6) };
        Self::from_hsv(h, s, v, self.a)
    }

    fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;

        let h = if delta == 0.0 {
            0.0
        } else if (max - self.r).abs() < f32::EPSILON {
            60.0 * (((self.g - self.b) / delta).rem_euclid(6.0))
        } else if (max - self.g).abs() < f32::EPSILON {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };
        let s = if max == 0.0 { 0.0 } else { delta / max };
        (h, s, max)
    }

    fn from_hsv(h: f32, s: f32, v: f32, a: f32) -> Self {
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match h {
            h if h < 60.0 => (c, x, 0.0),
            h if h < 120.0 => (x, c, 0.0),
            h if h < 180.0 => (0.0, c, x),
            h if h < 240.0 => (0.0, x, c),
            h if h < 300.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Self { r: r + m, g: g + m, b: b + m, a }
    }
}
