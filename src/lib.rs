#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fractal flame renderer
//!
//! A fractal flame is the attractor of an iterated function system:
//! a handful of affine maps, one of which is picked at random on every
//! step and applied to a running point.  What makes it a flame rather
//! than a plain IFS is that after each affine step the point is pushed
//! through a weighted mix of nonlinear "variations", and that the
//! image is not a scatter plot but a density histogram: every cell
//! counts how often the orbit passed through it, and the counts are
//! log-scaled so that both the faint wisps and the dense cores show.
//!
//! The pieces, leaves first: [`Vector2`] and [`ColorSet`] are the
//! orbit's position and color; [`Variation`] is the catalog of
//! nonlinear functions; [`Genome`] holds every parameter of one flame,
//! including the jump table ([`SelectionTable`]) used to pick
//! transforms; [`OrbitWorker`] runs the chaos game on its own thread;
//! and [`Histogram`] collects what the workers plot and tone-maps it
//! into pixels.

extern crate crossbeam;
extern crate itertools;
extern crate num;

pub mod camera;
pub mod color;
pub mod errors;
pub mod genome;
pub mod histogram;
pub mod selection;
pub mod variation;
pub mod vector;
pub mod worker;

pub use camera::Camera;
pub use color::ColorSet;
pub use errors::FlameError;
pub use genome::Genome;
pub use histogram::{Accumulator, Histogram, OPAQUE_BLACK};
pub use selection::{SelectionTable, RESOLUTION};
pub use variation::{BoundVariation, Variation, NUM_VARIATIONS};
pub use vector::{apply_affine, Affine, Vector2};
pub use worker::{run_for, OrbitWorker, Step, WorkerHandle, WorkerPool};
