//! Axis-aligned bounding box used as the BVH volume.

use glam::Vec3;
use std::fmt;

use crate::util::{Error, Result};

/// Axis-aligned bounding box.
///
/// Invariant: `min[i] <= max[i]` on every axis. Zero-extent boxes are legal.
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Inverted box; the identity for [`grow`](Self::grow).
    ///
    /// Not a valid box on its own: it only exists as a fold seed.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from its corners.
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.cmple(max).all(), "inverted bounds {min:?} > {max:?}");
        Self { min, max }
    }

    /// Create a box, rejecting inverted or non-finite corners.
    pub fn try_new(min: Vec3, max: Vec3) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || !min.cmple(max).all() {
            return Err(Error::InvalidBounds {
                min: min.to_array(),
                max: max.to_array(),
            });
        }
        Ok(Self { min, max })
    }

    /// Zero-extent box at a point.
    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Tight box around a set of points. `None` when there are no points.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut b = Self::from_point(first);
        for p in it {
            b.grow_point(p);
        }
        Some(b)
    }

    /// Componentwise min/max over all boxes.
    ///
    /// An empty input has no union; this returns `None` rather than a box.
    pub fn union_of<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<Self> {
        let mut it = boxes.into_iter();
        let mut acc = *it.next()?;
        for b in it {
            acc.grow(b);
        }
        Some(acc)
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include another box.
    #[inline]
    pub fn grow(&mut self, other: &BoundingBox) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Union of two boxes.
    #[inline]
    pub fn union(mut self, other: &BoundingBox) -> Self {
        self.grow(other);
        self
    }

    /// `max - min`.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Centre point.
    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Surface area (SAH cost signal).
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let d = self.extent();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Whether `other` lies inside this box (boundaries inclusive).
    #[inline]
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// Whether a point lies inside this box (boundaries inclusive).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Whether the two boxes overlap (touching counts).
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundingBox({:?} - {:?})", self.min, self.max)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}) -> ({}, {}, {})",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
