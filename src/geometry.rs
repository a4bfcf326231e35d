use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding volume of an element, in model coordinates.
///
/// A range is 3D-valid when `low <= high` on all three axes. 2D models
/// additionally require `low.z == high.z == 0`; the z axis carries no
/// meaning there and is forced back to zero on the query side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRange {
    pub low: DVec3,
    pub high: DVec3,
}

impl ElementRange {
    #[inline]
    pub fn new(low: DVec3, high: DVec3) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn from_coords(lx: f64, ly: f64, lz: f64, hx: f64, hy: f64, hz: f64) -> Self {
        Self::new(DVec3::new(lx, ly, lz), DVec3::new(hx, hy, hz))
    }

    /// A range that unions as the identity and intersects nothing.
    #[inline]
    pub fn empty() -> Self {
        Self {
            low: DVec3::splat(f64::INFINITY),
            high: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.low.x > self.high.x || self.low.y > self.high.y || self.low.z > self.high.z
    }

    /// Whether this range may be inserted into a 3D index.
    #[inline]
    pub fn is_valid_3d(&self) -> bool {
        self.low.x <= self.high.x && self.low.y <= self.high.y && self.low.z <= self.high.z
    }

    /// Whether this range may be inserted into a 2D index: valid in x/y
    /// and exactly flat at z == 0.
    #[inline]
    pub fn is_valid_2d(&self) -> bool {
        self.low.x <= self.high.x
            && self.low.y <= self.high.y
            && self.low.z == 0.0
            && self.high.z == 0.0
    }

    pub fn union(&self, other: &ElementRange) -> ElementRange {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        ElementRange {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }

    pub fn intersects(&self, other: &ElementRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.low.x <= other.high.x
            && self.high.x >= other.low.x
            && self.low.y <= other.high.y
            && self.high.y >= other.low.y
            && self.low.z <= other.high.z
            && self.high.z >= other.low.z
    }

    pub fn contains(&self, other: &ElementRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.low.x <= other.low.x
            && self.low.y <= other.low.y
            && self.low.z <= other.low.z
            && self.high.x >= other.high.x
            && self.high.y >= other.high.y
            && self.high.z >= other.high.z
    }

    /// Surface-free size measure used by the tree's split heuristics.
    /// Degenerate (point or flat) ranges legitimately have zero extent.
    pub fn volume_measure(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.high - self.low;
        // Perimeter-style measure so flat 2D ranges still order sensibly.
        d.x + d.y + d.z
    }

    /// How much this range would grow to also cover `other`.
    pub fn enlargement(&self, other: &ElementRange) -> f64 {
        self.union(other).volume_measure() - self.volume_measure()
    }

    /// Force z bounds to exactly zero, the form 2D queries must observe.
    pub fn flattened(&self) -> ElementRange {
        ElementRange {
            low: DVec3::new(self.low.x, self.low.y, 0.0),
            high: DVec3::new(self.high.x, self.high.y, 0.0),
        }
    }
}
