//! Stroke geometry: points, append-only point streams, and running bounds.
//!
//! A point stream is the unit of replication for one continuous drawing
//! gesture. Points are never reordered, deduplicated, or removed; for a shared
//! stream the order observed by every participant equals the order of appends
//! accepted by the server.

#[cfg(test)]
#[path = "geom_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

/// An immutable 3D coordinate. No identity beyond position and stream order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

/// Axis-aligned bounding volume maintained as a running componentwise
/// min/max. Grown incrementally per appended point, never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    #[must_use]
    pub const fn from_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: Point) {
        if p.x < self.min.x {
            self.min.x = p.x;
        }
        if p.y < self.min.y {
            self.min.y = p.y;
        }
        if p.z < self.min.z {
            self.min.z = p.z;
        }
        if p.x > self.max.x {
            self.max.x = p.x;
        }
        if p.y > self.max.y {
            self.max.y = p.y;
        }
        if p.z > self.max.z {
            self.max.z = p.z;
        }
    }

    /// Centroid of the volume, used to position the collision volume once a
    /// stroke is finalized.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + (self.max.x - self.min.x) / 2.0,
            self.min.y + (self.max.y - self.min.y) / 2.0,
            self.min.z + (self.max.z - self.min.z) / 2.0,
        )
    }

    #[must_use]
    pub fn size(&self) -> Point {
        Point::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }
}

/// Ordered, append-only sequence of points. Frozen once its stroke ends;
/// appends after freezing are no-ops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointStream {
    points: Vec<Point>,
    frozen: bool,
}

impl PointStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one point. Returns `false` if the stream is frozen.
    pub fn push(&mut self, p: Point) -> bool {
        if self.frozen {
            return false;
        }
        self.points.push(p);
        true
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }
}
