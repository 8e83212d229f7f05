//! Axis-aligned bounding boxes in projection units.

use serde::{Deserialize, Serialize};

use crate::proj::TransformFn;

/// An axis-aligned bounding box `(min_x, min_y, max_x, max_y)`.
///
/// An extent whose minimum exceeds its maximum on either axis is empty.
/// [`Extent::empty`] returns the canonical empty extent, which grows to fit
/// the first coordinate it is extended with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The canonical empty extent (`+inf, +inf, -inf, -inf`).
    pub const fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Smallest extent containing every `(x, y)` point.
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut extent = Self::empty();
        for p in points {
            extent.extend_xy(p[0], p[1]);
        }
        extent
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area, or `0.0` for empty extents.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width() * self.height()
        }
    }

    /// True when the extent encloses no area (zero or negative width/height).
    pub fn is_empty(&self) -> bool {
        !(self.max_x > self.min_x && self.max_y > self.min_y)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        ]
    }

    pub fn top_left(&self) -> [f64; 2] {
        [self.min_x, self.max_y]
    }

    pub fn top_right(&self) -> [f64; 2] {
        [self.max_x, self.max_y]
    }

    pub fn bottom_left(&self) -> [f64; 2] {
        [self.min_x, self.min_y]
    }

    pub fn bottom_right(&self) -> [f64; 2] {
        [self.max_x, self.min_y]
    }

    /// Inclusive containment test.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    /// Inclusive overlap test: touching edges intersect.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Overlap of two extents; [`Extent::empty`] when they do not intersect.
    pub fn intersection(&self, other: &Extent) -> Extent {
        if !self.intersects(other) {
            return Self::empty();
        }
        Self::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    pub fn extend_xy(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn extend(&mut self, other: &Extent) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Grow the extent by `value` on every side.
    pub fn buffer(&self, value: f64) -> Extent {
        Self::new(
            self.min_x - value,
            self.min_y - value,
            self.max_x + value,
            self.max_y + value,
        )
    }

    /// Shift the extent along the x axis.
    pub fn translate_x(&self, dx: f64) -> Extent {
        Self::new(self.min_x + dx, self.min_y, self.max_x + dx, self.max_y)
    }

    /// Transform the extent and return the bounding extent of the result.
    ///
    /// The four corners are always transformed. With `stops > 0`, each edge
    /// is additionally sampled at `stops` evenly spaced interior points so
    /// that curved edges in the destination space are not undershot.
    pub fn apply_transform(&self, transform: &TransformFn, stops: usize) -> Extent {
        let mut coords = Vec::with_capacity(8 * (stops + 1));
        if stops > 0 {
            let width = self.width();
            let height = self.height();
            let n = (stops + 1) as f64;
            for i in 0..=stops {
                let fx = width * i as f64 / n;
                let fy = height * i as f64 / n;
                coords.extend_from_slice(&[
                    self.min_x + fx,
                    self.min_y,
                    self.max_x,
                    self.min_y + fy,
                    self.max_x - fx,
                    self.max_y,
                    self.min_x,
                    self.max_y - fy,
                ]);
            }
        } else {
            coords.extend_from_slice(&[
                self.min_x, self.min_y, self.min_x, self.max_y, self.max_x, self.min_y, self.max_x,
                self.max_y,
            ]);
        }
        transform.apply_in_place(&mut coords, 2);

        let mut extent = Self::empty();
        for xy in coords.chunks_exact(2) {
            extent.extend_xy(xy[0], xy[1]);
        }
        extent
    }
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}
