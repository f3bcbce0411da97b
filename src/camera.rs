// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Camera, which describes how the real plane the orbit
//! wanders over is framed onto the integral plane of histogram cells.
//! The integral plane starts at 0,0; the camera supplies an offset, a
//! per-axis scale (the width of real plane that fits across the grid),
//! and whether the real origin sits at the center of the grid or at
//! its corner.

use serde::{Deserialize, Serialize};

use crate::vector::Vector2;

/// Describes the x, y of a cell in the integral plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cell(pub usize, pub usize);

/// Framing parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Added to x before scaling.
    pub x_offset: f64,
    /// Added to y before scaling.
    pub y_offset: f64,
    /// Width of real plane spanning the grid.
    pub x_scale: f64,
    /// Height of real plane spanning the grid.
    pub y_scale: f64,
    /// Put the real origin in the middle of the grid.
    pub center: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            x_offset: 0.0,
            y_offset: 0.0,
            x_scale: 4.0,
            y_scale: 4.0,
            center: true,
        }
    }
}

impl Camera {
    /// Given a point on the real plane, find the cell of a `width` by
    /// `height` grid it lands in.  Anything off the grid, including
    /// NaN, is `None`.  A centered origin sits at cell `width / 2`,
    /// rounded down, on odd grids too.
    pub fn point_to_cell(&self, point: &Vector2, width: usize, height: usize) -> Option<Cell> {
        let (w, h) = (width as f64, height as f64);
        let (cx, cy) = if self.center {
            ((width / 2) as f64, (height / 2) as f64)
        } else {
            (0.0, 0.0)
        };
        let left = ((point.x + self.x_offset) * (w / self.x_scale) + cx).floor();
        let top = ((point.y + self.y_offset) * (h / self.y_scale) + cy).floor();
        if !(left >= 0.0 && left < w && top >= 0.0 && top < h) {
            return None;
        }
        Some(Cell(left as usize, top as usize))
    }

    /// As `point_to_cell`, but returns the linear offset of the cell in
    /// a row-major buffer.
    #[inline]
    pub fn point_to_offset(&self, point: &Vector2, width: usize, height: usize) -> Option<usize> {
        self.point_to_cell(point, width, height)
            .map(|Cell(left, top)| top * width + left)
    }

    /// A camera needs a non-zero, finite scale on both axes.
    pub fn is_usable(&self) -> bool {
        self.x_scale.is_finite()
            && self.y_scale.is_finite()
            && self.x_scale != 0.0
            && self.y_scale != 0.0
            && self.x_offset.is_finite()
            && self.y_offset.is_finite()
    }
}
