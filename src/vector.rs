// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The running point of the chaos game, and the affine maps that
//! move it.  Both are plain stack values: the inner loop mutates them
//! in place and never allocates.

use serde::{Deserialize, Serialize};

/// A 2x3 affine map `(x, y) -> (a*x + b*y + c, d*x + e*y + f)`,
/// stored as `[[a, b, c], [d, e, f]]`.
pub type Affine = [[f64; 3]; 2];

/// A point on the real plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Vector2 {
    /// A point at `(x, y)`.
    pub fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    /// The origin.
    pub fn zero() -> Self {
        Vector2 { x: 0.0, y: 0.0 }
    }

    /// Overwrite both coordinates.
    #[inline]
    pub fn set(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Add another vector to this one, in place.
    #[inline]
    pub fn add(&mut self, other: &Vector2) {
        self.x += other.x;
        self.y += other.y;
    }

    /// Multiply both coordinates by `factor`, in place.
    #[inline]
    pub fn scale(&mut self, factor: f64) {
        self.x *= factor;
        self.y *= factor;
    }

    /// Squared distance from the origin.
    #[inline]
    pub fn norm_sqr(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// False once either coordinate has run off to infinity or NaN.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Apply `matrix` to `point`, writing the result into `out`.  The
/// source point is left alone so the caller can still blend it.
#[inline]
pub fn apply_affine(matrix: &Affine, point: &Vector2, out: &mut Vector2) {
    out.x = matrix[0][0] * point.x + matrix[0][1] * point.y + matrix[0][2];
    out.y = matrix[1][0] * point.x + matrix[1][1] * point.y + matrix[1][2];
}
