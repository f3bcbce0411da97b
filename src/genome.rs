// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The genome: every parameter that determines what a flame looks
//! like.
//!
//! A genome is plain data.  Its structural half (the affine maps, the
//! jump table, the colors and the variation set) is fixed once it is
//! built; its framing half (camera and toggles) may be edited between
//! runs, after which the histogram has to be reset.  Workers never
//! share a genome: each takes its own copy with
//! [`Genome::clone_for_worker`].

use log::info;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::color::ColorSet;
use crate::errors::FlameError;
use crate::selection::SelectionTable;
use crate::variation::{BoundVariation, NUM_VARIATIONS};
use crate::vector::Affine;

/// The fewest transforms a genome may have.
pub const MIN_TRANSFORMS: usize = 3;

/// Most variations a random genome switches on at once.
const MAX_RANDOM_VARIATIONS: usize = 4;

/// The complete description of one fractal flame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Number of affine transforms; at least [`MIN_TRANSFORMS`].
    pub transform_count: usize,
    /// One affine map per transform.
    pub affine_matrices: Vec<Affine>,
    /// Weighted transform picker.
    pub selection_table: SelectionTable,
    /// Color each transform pulls the orbit toward.
    pub transform_colors: Vec<ColorSet>,
    /// Color each final transform pulls the orbit toward.
    pub final_colors: Vec<ColorSet>,
    /// Final affine maps, indexed like `affine_matrices`.
    pub final_matrices: Vec<Affine>,
    /// Ascending, unique variation ids.
    pub active_variations: Vec<usize>,
    /// Weight per variation id; only active ids are read.
    pub variation_weights: Vec<f64>,
    /// Coefficient row per variation id, plus one trailing spare row.
    pub variation_parameters: Vec<[f64; 4]>,
    /// Framing.
    pub camera: Camera,
    /// Log (rather than linear) density tone mapping.
    pub log_scale: bool,
    /// Apply the variations after the affine step.
    pub variation_enabled: bool,
    /// Apply the final transforms after the variations.
    pub final_transform_enabled: bool,
    /// Last transform chosen.  For display only.
    pub current_transform_index: i32,
}

fn random_affine<R: Rng + ?Sized>(rng: &mut R) -> Affine {
    let mut m = [[0.0; 3]; 2];
    for row in m.iter_mut() {
        for v in row.iter_mut() {
            *v = rng.gen_range(-1.0, 1.0);
        }
    }
    m
}

fn random_color<R: Rng + ?Sized>(rng: &mut R) -> ColorSet {
    ColorSet::new(rng.gen(), rng.gen(), rng.gen())
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), FlameError> {
    if expected == found {
        Ok(())
    } else {
        Err(FlameError::ShapeMismatch {
            field,
            expected,
            found,
        })
    }
}

impl Genome {
    /// Build a random genome with between `min_transforms` and
    /// `max_transforms` transforms inclusive.  `min_transforms` is
    /// raised to 3 if it is lower, and `max_transforms` to
    /// `min_transforms`.
    pub fn random<R: Rng + ?Sized>(min_transforms: usize, max_transforms: usize, rng: &mut R) -> Genome {
        let min_transforms = min_transforms.max(MIN_TRANSFORMS);
        let max_transforms = max_transforms.max(min_transforms);
        let transform_count = rng.gen_range(min_transforms, max_transforms + 1);

        let affine_matrices = (0..transform_count).map(|_| random_affine(rng)).collect();
        let final_matrices = (0..transform_count).map(|_| random_affine(rng)).collect();
        let transform_colors = (0..transform_count).map(|_| random_color(rng)).collect();
        let final_colors = (0..transform_count).map(|_| random_color(rng)).collect();
        let selection_table = SelectionTable::random(transform_count, rng);

        let wanted = rng.gen_range(1, MAX_RANDOM_VARIATIONS + 1);
        let mut active_variations = index::sample(rng, NUM_VARIATIONS, wanted).into_vec();
        active_variations.sort();

        let mut variation_weights = vec![0.0; NUM_VARIATIONS];
        for &id in &active_variations {
            variation_weights[id] = rng.gen_range(0.1, 1.0);
        }
        let total: f64 = active_variations.iter().map(|&id| variation_weights[id]).sum();
        for &id in &active_variations {
            variation_weights[id] /= total;
        }

        let variation_parameters = (0..=NUM_VARIATIONS)
            .map(|_| {
                let mut row = [0.0; 4];
                for v in row.iter_mut() {
                    *v = rng.gen_range(-1.0, 1.0);
                }
                row
            })
            .collect();

        info!(
            "built genome with {} transforms and variations {:?}",
            transform_count, active_variations
        );

        Genome {
            transform_count,
            affine_matrices,
            selection_table,
            transform_colors,
            final_colors,
            final_matrices,
            active_variations,
            variation_weights,
            variation_parameters,
            camera: Camera::default(),
            log_scale: true,
            variation_enabled: true,
            final_transform_enabled: false,
            current_transform_index: -1,
        }
    }

    /// A deep copy for one worker to own.  The diagnostic transform
    /// index starts over.
    pub fn clone_for_worker(&self) -> Genome {
        Genome {
            current_transform_index: -1,
            ..self.clone()
        }
    }

    /// Check every structural invariant.  Genomes read from disk must
    /// pass this before they go anywhere near a worker.
    pub fn validate(&self) -> Result<(), FlameError> {
        let n = self.transform_count;
        if n < MIN_TRANSFORMS {
            return Err(FlameError::TooFewTransforms(n));
        }
        check_len("affine_matrices", n, self.affine_matrices.len())?;
        check_len("final_matrices", n, self.final_matrices.len())?;
        check_len("transform_colors", n, self.transform_colors.len())?;
        check_len("final_colors", n, self.final_colors.len())?;
        check_len("variation_weights", NUM_VARIATIONS, self.variation_weights.len())?;
        check_len(
            "variation_parameters",
            NUM_VARIATIONS + 1,
            self.variation_parameters.len(),
        )?;
        self.selection_table.validate(n)?;
        if let Some(&id) = self.active_variations.iter().find(|&&id| id >= NUM_VARIATIONS) {
            return Err(FlameError::UnknownVariation(id));
        }
        if !self.active_variations.windows(2).all(|w| w[0] < w[1]) {
            return Err(FlameError::UnorderedVariations(self.active_variations.clone()));
        }
        if !self.camera.is_usable() {
            return Err(FlameError::InvalidGeometry(format!(
                "camera scale {} x {} cannot frame a histogram",
                self.camera.x_scale, self.camera.y_scale
            )));
        }
        Ok(())
    }

    /// Resolve the active variation ids against the catalog, pairing
    /// each with its weight and parameter row.
    pub fn bind_variations(&self) -> Result<Vec<BoundVariation>, FlameError> {
        self.active_variations
            .iter()
            .map(|&id| {
                let weight = self.variation_weights.get(id).cloned().unwrap_or(0.0);
                let params = self.variation_parameters.get(id).cloned().unwrap_or([0.0; 4]);
                BoundVariation::new(id, weight, params)
            })
            .collect()
    }
}
