// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The density histogram every worker plots into, and the tone mapper
//! that turns it into pixels.
//!
//! The accumulation grid is supersampled: it is `supersample` times
//! wider and taller than the output image.  Each cell keeps a visit
//! count, which only ever grows, and a color, which is blended halfway
//! toward every new sample so it follows the orbit's recent history.
//!
//! Workers write into the grid concurrently and without a lock.  Every
//! field is an atomic with relaxed ordering, and the color blend is a
//! separate load and store, so two workers landing on the same cell at
//! the same moment can lose one of the blends.  Over millions of
//! samples that is invisible, and it is what lets the workers scale.

use itertools::iproduct;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::camera::Camera;
use crate::color::ColorSet;
use crate::errors::FlameError;
use crate::genome::Genome;
use crate::vector::Vector2;

/// The pixel written for anything never visited.
pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

/// Anything that can take the samples an orbit produces.
pub trait Accumulator {
    /// Record one sample.
    fn hit(&self, point: &Vector2, color: &ColorSet);
}

/// One supersampled cell.  Colors are `f64` bit patterns.
#[derive(Default)]
struct AccumCell {
    r: AtomicU64,
    g: AtomicU64,
    b: AtomicU64,
    density: AtomicU64,
}

impl AccumCell {
    #[inline]
    fn blend(channel: &AtomicU64, sample: f64) {
        let old = f64::from_bits(channel.load(Ordering::Relaxed));
        channel.store(((old + sample) / 2.0).to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn read(channel: &AtomicU64) -> f64 {
        f64::from_bits(channel.load(Ordering::Relaxed))
    }

    fn clear(&self) {
        let zero = 0.0f64.to_bits();
        self.r.store(zero, Ordering::Relaxed);
        self.g.store(zero, Ordering::Relaxed);
        self.b.store(zero, Ordering::Relaxed);
        self.density.store(0, Ordering::Relaxed);
    }
}

/// Per output pixel sums, rebuilt on every render.
#[derive(Copy, Clone, Default)]
struct FrameCell {
    r: f64,
    g: f64,
    b: f64,
    density: f64,
    nonzero: u32,
}

/// Shared density and color accumulator.
pub struct Histogram {
    width: usize,
    height: usize,
    supersample: usize,
    gamma: f64,
    camera: Camera,
    accum: Vec<AccumCell>,
    frame: Mutex<Vec<FrameCell>>,
}

fn check_geometry(width: usize, height: usize, supersample: usize) -> Result<(), FlameError> {
    if width == 0 || height == 0 || supersample == 0 {
        return Err(FlameError::InvalidGeometry(format!(
            "{}x{} at supersample {} has no cells",
            width, height, supersample
        )));
    }
    Ok(())
}

fn allocate(cells: usize) -> Vec<AccumCell> {
    (0..cells).map(|_| AccumCell::default()).collect()
}

/// How bright a pixel with `density` visits should be, in `[0, 1]`,
/// when the busiest pixel has `max_density`.
pub fn brightness(density: f64, max_density: f64, gamma: f64, log_scale: bool) -> f64 {
    if density <= 0.0 || max_density <= 0.0 {
        return 0.0;
    }
    let ratio = if !log_scale {
        density / max_density
    } else if max_density <= 1.0 {
        // Every visited pixel was visited exactly once; ln(1) / ln(1)
        // is undefined, so treat them all as the brightest.
        1.0
    } else {
        density.ln() / max_density.ln()
    };
    let scaled = ratio.powf(1.0 / gamma);
    if scaled.is_finite() {
        num::clamp(scaled, 0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
fn to_byte(channel: f64) -> u32 {
    let v = (channel * 255.0).round();
    if v.is_finite() {
        num::clamp(v, 0.0, 255.0) as u32
    } else {
        0
    }
}

impl Histogram {
    /// A histogram for a `width` by `height` image, accumulated at
    /// `supersample` cells per pixel along each axis.
    pub fn new(width: usize, height: usize, supersample: usize) -> Result<Histogram, FlameError> {
        check_geometry(width, height, supersample)?;
        let cells = width * height * supersample * supersample;
        Ok(Histogram {
            width,
            height,
            supersample,
            gamma: 1.0,
            camera: Camera::default(),
            accum: allocate(cells),
            frame: Mutex::new(vec![FrameCell::default(); width * height]),
        })
    }

    /// Use `camera` to frame samples.
    pub fn with_camera(mut self, camera: Camera) -> Result<Histogram, FlameError> {
        self.set_camera(camera)?;
        Ok(self)
    }

    /// Tone-mapping gamma.  It must be positive and finite.
    pub fn with_gamma(mut self, gamma: f64) -> Result<Histogram, FlameError> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(FlameError::InvalidGeometry(format!(
                "gamma {} must be positive and finite",
                gamma
            )));
        }
        self.gamma = gamma;
        Ok(self)
    }

    /// Output image width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Output image height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cells per pixel along each axis.
    pub fn supersample(&self) -> usize {
        self.supersample
    }

    /// The tone-mapping gamma.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// The camera samples are framed with.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Width of the supersampled grid.
    pub fn grid_width(&self) -> usize {
        self.width * self.supersample
    }

    /// Height of the supersampled grid.
    pub fn grid_height(&self) -> usize {
        self.height * self.supersample
    }

    /// Total visits recorded so far.
    pub fn total_density(&self) -> u64 {
        self.accum
            .iter()
            .map(|c| c.density.load(Ordering::Relaxed))
            .sum()
    }

    /// Forget everything accumulated.
    pub fn reset(&mut self) {
        for cell in &self.accum {
            cell.clear();
        }
        debug!("histogram reset ({} cells)", self.accum.len());
    }

    /// Change the framing.  What was accumulated under the old camera
    /// is meaningless under the new one, so this resets.
    pub fn set_camera(&mut self, camera: Camera) -> Result<(), FlameError> {
        if !camera.is_usable() {
            return Err(FlameError::InvalidGeometry(format!(
                "camera scale {} x {} cannot frame a histogram",
                camera.x_scale, camera.y_scale
            )));
        }
        self.camera = camera;
        self.reset();
        Ok(())
    }

    /// Reallocate the grid at a new supersampling factor.
    pub fn set_supersample(&mut self, supersample: usize) -> Result<(), FlameError> {
        check_geometry(self.width, self.height, supersample)?;
        self.supersample = supersample;
        self.accum = allocate(self.grid_width() * self.grid_height());
        debug!(
            "histogram reallocated at {}x{}",
            self.grid_width(),
            self.grid_height()
        );
        Ok(())
    }

    /// Collapse the grid into one packed `0xAARRGGBB` word per output
    /// pixel, row-major.  Log or linear scaling follows the genome.
    /// Pixels no sample has colored come out opaque black.
    pub fn render(&self, genome: &Genome) -> Vec<u32> {
        let mut frame = self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (gw, gh, ss) = (self.grid_width(), self.grid_height(), self.supersample);

        let mut max_density = 0.0f64;
        for (row, column) in iproduct!(0..gh, 0..gw) {
            let cell = &self.accum[row * gw + column];
            let r = AccumCell::read(&cell.r);
            let pixel = &mut frame[(row / ss) * self.width + column / ss];
            pixel.r += r;
            pixel.g += AccumCell::read(&cell.g);
            pixel.b += AccumCell::read(&cell.b);
            pixel.density += cell.density.load(Ordering::Relaxed) as f64;
            if r != 0.0 {
                pixel.nonzero += 1;
            }
            max_density = max_density.max(pixel.density);
        }

        let mut pixels = vec![OPAQUE_BLACK; frame.len()];
        for (out, cell) in pixels.iter_mut().zip(frame.iter_mut()) {
            if cell.nonzero > 0 {
                let n = f64::from(cell.nonzero);
                let scale = brightness(cell.density, max_density, self.gamma, genome.log_scale);
                *out = OPAQUE_BLACK
                    | to_byte(cell.r / n * scale) << 16
                    | to_byte(cell.g / n * scale) << 8
                    | to_byte(cell.b / n * scale);
            }
            *cell = FrameCell::default();
        }
        pixels
    }
}

impl Accumulator for Histogram {
    #[inline]
    fn hit(&self, point: &Vector2, color: &ColorSet) {
        let offset = match self
            .camera
            .point_to_offset(point, self.grid_width(), self.grid_height())
        {
            Some(offset) => offset,
            None => return,
        };
        let cell = &self.accum[offset];
        AccumCell::blend(&cell.r, color.r);
        AccumCell::blend(&cell.g, color.g);
        AccumCell::blend(&cell.b, color.b);
        cell.density.fetch_add(1, Ordering::Relaxed);
    }
}
