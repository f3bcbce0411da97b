// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The jump table used to pick a transform on every step of the chaos
//! game.
//!
//! Rather than normalising a list of weights into a cumulative
//! distribution, we draw one uniform value per transform, sort them, and
//! use the sorted values as the boundaries of a quantised inverse CDF.
//! Transform `i` then owns the slots between boundary `i - 1` and
//! boundary `i`, which weights each transform by the spacing of the
//! order statistics.  The last transform also owns every slot past the
//! final boundary.  Sampling is a single integer draw and an index.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::FlameError;

/// Number of slots in the table.
pub const RESOLUTION: usize = 1000;

/// A quantised inverse CDF over transform indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionTable(Vec<usize>);

impl SelectionTable {
    /// Draw fresh boundaries for `transforms` transforms and build the
    /// table from them.
    pub fn random<R: Rng + ?Sized>(transforms: usize, rng: &mut R) -> Self {
        let mut boundaries: Vec<f64> = (0..transforms).map(|_| rng.gen::<f64>()).collect();
        boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        SelectionTable::from_boundaries(&boundaries)
    }

    /// Build the table from already-sorted boundaries in `[0, 1)`, one
    /// per transform.
    pub fn from_boundaries(boundaries: &[f64]) -> Self {
        let last = boundaries.len().saturating_sub(1);
        let mut table = vec![last; RESOLUTION];
        let (mut slot, mut transform) = (0, 0);
        while slot < RESOLUTION && transform < boundaries.len() {
            if (slot as f64) / (RESOLUTION as f64) < boundaries[transform] {
                table[slot] = transform;
                slot += 1;
            } else {
                transform += 1;
            }
        }
        SelectionTable(table)
    }

    /// Pick a transform index.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.0[rng.gen_range(0, self.0.len())]
    }

    /// The raw slots.
    pub fn slots(&self) -> &[usize] {
        &self.0
    }

    /// How many slots each of `transforms` transforms owns.
    pub fn counts(&self, transforms: usize) -> Vec<usize> {
        let mut counts = vec![0; transforms];
        for &index in self.0.iter().filter(|&&i| i < transforms) {
            counts[index] += 1;
        }
        counts
    }

    /// Check that the table is full-sized and every slot names one of
    /// `transforms` transforms.
    pub fn validate(&self, transforms: usize) -> Result<(), FlameError> {
        if self.0.len() != RESOLUTION {
            return Err(FlameError::ShapeMismatch {
                field: "selection_table",
                expected: RESOLUTION,
                found: self.0.len(),
            });
        }
        match self.0.iter().position(|&i| i >= transforms) {
            Some(slot) => Err(FlameError::SelectionOutOfRange {
                slot,
                index: self.0[slot],
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn even_boundaries_split_evenly_with_the_tail_on_the_last() {
        let table = SelectionTable::from_boundaries(&[0.25, 0.5, 0.75]);
        assert_eq!(table.counts(3), vec![250, 250, 500]);
        assert_eq!(table.slots()[249], 0);
        assert_eq!(table.slots()[250], 1);
        assert_eq!(table.slots()[999], 2);
    }

    #[test]
    fn a_zero_boundary_owns_nothing() {
        let table = SelectionTable::from_boundaries(&[0.0, 0.1, 0.9]);
        assert_eq!(table.counts(3), vec![0, 100, 900]);
    }

    #[test]
    fn random_tables_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(11);
        for transforms in 3..12 {
            let table = SelectionTable::random(transforms, &mut rng);
            assert!(table.validate(transforms).is_ok());
            assert_eq!(table.counts(transforms).iter().sum::<usize>(), RESOLUTION);
        }
    }

    #[test]
    fn slot_counts_follow_boundary_gaps() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut boundaries: Vec<f64> = (0..5).map(|_| rng.gen::<f64>()).collect();
        boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let table = SelectionTable::from_boundaries(&boundaries);
        let counts = table.counts(5);
        let mut previous = 0.0;
        for (i, &b) in boundaries.iter().enumerate() {
            let upper = if i == boundaries.len() - 1 { 1.0 } else { b };
            let expected = (upper - previous) * RESOLUTION as f64;
            assert!(
                (counts[i] as f64 - expected).abs() <= 1.0,
                "transform {}: {} slots, expected about {}",
                i,
                counts[i],
                expected
            );
            previous = b;
        }
    }

    #[test]
    fn sampling_frequencies_match_slot_counts() {
        let table = SelectionTable::from_boundaries(&[0.1, 0.4, 0.9]);
        let mut rng = SmallRng::seed_from_u64(99);
        let draws = 200_000;
        let mut seen = vec![0usize; 3];
        for _ in 0..draws {
            seen[table.sample(&mut rng)] += 1;
        }
        for (i, &expected) in [0.1, 0.3, 0.6].iter().enumerate() {
            let freq = seen[i] as f64 / draws as f64;
            assert!((freq - expected).abs() < 0.01, "{} vs {}", freq, expected);
        }
    }

    #[test]
    fn validation_catches_bad_tables() {
        let short = SelectionTable(vec![0; 10]);
        assert!(short.validate(3).is_err());
        let mut slots = vec![0; RESOLUTION];
        slots[17] = 3;
        assert_eq!(
            SelectionTable(slots).validate(3),
            Err(FlameError::SelectionOutOfRange { slot: 17, index: 3 })
        );
    }
}
