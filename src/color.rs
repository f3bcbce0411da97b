// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Orbit color.

use serde::{Deserialize, Serialize};

/// An RGB triple, nominally in `[0, 1]` per channel but never clamped.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSet {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
}

impl ColorSet {
    /// A color from its three channels.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        ColorSet { r, g, b }
    }

    /// All channels zero.
    pub fn black() -> Self {
        ColorSet::default()
    }

    /// Move halfway toward `sample`.  Repeated hits forget old colors
    /// geometrically, so the color tracks where the orbit has been
    /// recently rather than everywhere it has ever been.
    #[inline]
    pub fn hit(&mut self, sample: &ColorSet) {
        self.r = (self.r + sample.r) / 2.0;
        self.g = (self.g + sample.g) / 2.0;
        self.b = (self.b + sample.b) / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_hit_averages() {
        let mut c = ColorSet::new(0.2, 0.4, 1.0);
        c.hit(&ColorSet::new(0.6, 0.0, 0.0));
        assert_eq!(c, ColorSet::new(0.4, 0.2, 0.5));
    }

    #[test]
    fn repeated_hits_converge_on_the_sample() {
        let mut c = ColorSet::black();
        let white = ColorSet::new(1.0, 1.0, 1.0);
        for _ in 0..20 {
            c.hit(&white);
        }
        assert!(c.r > 0.999_999);
        assert!(c.g > 0.999_999);
        assert!(c.b > 0.999_999);
    }
}
