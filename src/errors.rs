// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Everything that can go wrong before a flame starts iterating.
//! Once the workers are running, nothing is an error: divergent
//! orbits are reset and stray samples are dropped.

use failure::Fail;

/// Configuration and thread-management failures.
#[derive(Debug, Fail, PartialEq)]
pub enum FlameError {
    /// A variation id outside the catalog.
    #[fail(display = "unknown variation id {}", _0)]
    UnknownVariation(usize),

    /// Variation ids that are repeated or out of order.
    #[fail(display = "active variations {:?} are not unique and ascending", _0)]
    UnorderedVariations(Vec<usize>),

    /// Fewer than three affine transforms.
    #[fail(display = "a genome needs at least 3 transforms, found {}", _0)]
    TooFewTransforms(usize),

    /// One of the genome's parallel arrays has the wrong length.
    #[fail(
        display = "genome field {} should have {} entries, found {}",
        field, expected, found
    )]
    ShapeMismatch {
        /// The offending field.
        field: &'static str,
        /// The length it should have.
        expected: usize,
        /// The length it has.
        found: usize,
    },

    /// The jump table points at a transform that does not exist.
    #[fail(display = "selection slot {} points at missing transform {}", slot, index)]
    SelectionOutOfRange {
        /// Slot in the jump table.
        slot: usize,
        /// The transform index stored there.
        index: usize,
    },

    /// The histogram or camera cannot describe a usable plane.
    #[fail(display = "invalid geometry: {}", _0)]
    InvalidGeometry(String),

    /// The operating system refused to give us a thread.
    #[fail(display = "could not spawn worker: {}", _0)]
    Spawn(String),

    /// A worker thread panicked before it could be joined.
    #[fail(display = "an orbit worker panicked")]
    WorkerPanicked,
}
