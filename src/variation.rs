// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The variation catalog.
//!
//! A variation is a nonlinear function of the post-affine point.  The
//! chaos game replaces the point with the weighted sum of every active
//! variation's contribution, which is what turns a plain IFS into a
//! flame.  Each variation has a small, stable integer id; genomes store
//! the ids, and the ids are turned into [`BoundVariation`]s once, when a
//! worker is built, so an unknown id is caught before any thread runs.
//!
//! In the formulas below `r` is the distance from the origin and
//! `theta` is `atan2(x, y)`.  Variations that take parameters read them
//! from the genome's per-id parameter row.

use rand::Rng;
use std::f64::consts::PI;

use crate::errors::FlameError;
use crate::vector::Vector2;

/// Number of variation ids, `0..NUM_VARIATIONS`.
pub const NUM_VARIATIONS: usize = 32;

/// The noise slot.  It is accepted as an id but renders as
/// [`NOISE_SUBSTITUTE`]; the random-offset formula it is named for
/// produces muddy images.
pub const RESERVED_VARIATION: usize = 31;

/// What the reserved id renders as.
pub const NOISE_SUBSTITUTE: Variation = Variation::Linear;

/// Keeps the `1/r` family finite at the origin.
const EPS: f64 = 1e-10;

/// The closed set of variation formulas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variation {
    /// `(x, y)`
    Linear,
    /// `(sin x, sin y)`
    Sinusoidal,
    /// `(x, y) / r^2`
    Spherical,
    /// Rotation by `r^2`.
    Swirl,
    /// `((x - y)(x + y), 2xy) / r`
    Horseshoe,
    /// `(theta / pi, r - 1)`
    Polar,
    /// `r (sin(theta + r), cos(theta - r))`
    Handkerchief,
    /// `r (sin(theta r), -cos(theta r))`
    Heart,
    /// `theta/pi (sin(pi r), cos(pi r))`
    Disc,
    /// `(cos theta + sin r, sin theta - cos r) / r`
    Spiral,
    /// `(sin theta / r, r cos theta)`
    Hyperbolic,
    /// `(sin theta cos r, cos theta sin r)`
    Diamond,
    /// Cubed sine/cosine mix.
    Ex,
    /// Square root with a random half-turn.
    Julia,
    /// Folds the negative quadrants.
    Bent,
    /// Parameters `[b, c, e, f]`.
    Waves,
    /// `2 / (r + 1) (y, x)`
    Fisheye,
    /// Parameters `[c, f, _, _]`.
    Popcorn,
    /// `e^(x - 1) (cos(pi y), sin(pi y))`
    Exponential,
    /// `r^(sin theta) (cos theta, sin theta)`
    Power,
    /// `(cos(pi x) cosh y, -sin(pi x) sinh y)`
    Cosine,
    /// Parameters `[c, _, _, _]`.
    Rings,
    /// Parameters `[c, f, _, _]`.
    Fan,
    /// Parameters `[high, low, waves, _]`.
    Blob,
    /// Parameters `[a, b, c, d]`.
    Pdj,
    /// Parameters `[x, y, _, _]`.
    Fan2,
    /// Parameters `[val, _, _, _]`.
    Rings2,
    /// `2 / (r + 1) (x, y)`
    Eyefish,
    /// `4 / (r^2 + 4) (x, y)`
    Bubble,
    /// `(sin x, y)`
    Cylinder,
    /// Parameters `[angle, dist, _, _]`.
    Perspective,
}

const CATALOG: [Variation; NUM_VARIATIONS - 1] = [
    Variation::Linear,
    Variation::Sinusoidal,
    Variation::Spherical,
    Variation::Swirl,
    Variation::Horseshoe,
    Variation::Polar,
    Variation::Handkerchief,
    Variation::Heart,
    Variation::Disc,
    Variation::Spiral,
    Variation::Hyperbolic,
    Variation::Diamond,
    Variation::Ex,
    Variation::Julia,
    Variation::Bent,
    Variation::Waves,
    Variation::Fisheye,
    Variation::Popcorn,
    Variation::Exponential,
    Variation::Power,
    Variation::Cosine,
    Variation::Rings,
    Variation::Fan,
    Variation::Blob,
    Variation::Pdj,
    Variation::Fan2,
    Variation::Rings2,
    Variation::Eyefish,
    Variation::Bubble,
    Variation::Cylinder,
    Variation::Perspective,
];

impl Variation {
    /// Look a variation up by id.  The reserved id resolves to its
    /// substitute; anything past the catalog is an error.
    pub fn from_id(id: usize) -> Result<Variation, FlameError> {
        match id {
            RESERVED_VARIATION => Ok(NOISE_SUBSTITUTE),
            _ if id < CATALOG.len() => Ok(CATALOG[id]),
            _ => Err(FlameError::UnknownVariation(id)),
        }
    }

    /// The formula's own id.  The reserved id never comes back out of
    /// this, since nothing renders as noise.
    pub fn id(self) -> usize {
        self as usize
    }

    /// Contribution of this variation for the post-affine point `t`,
    /// before weighting.
    pub fn apply<R: Rng + ?Sized>(self, t: &Vector2, params: &[f64; 4], rng: &mut R) -> Vector2 {
        let (x, y) = (t.x, t.y);
        let r2 = t.norm_sqr();
        let r = r2.sqrt();
        let theta = x.atan2(y);

        match self {
            Variation::Linear => Vector2::new(x, y),
            Variation::Sinusoidal => Vector2::new(x.sin(), y.sin()),
            Variation::Spherical => {
                let k = 1.0 / (r2 + EPS);
                Vector2::new(x * k, y * k)
            }
            Variation::Swirl => {
                let (s, c) = r2.sin_cos();
                Vector2::new(x * s - y * c, x * c + y * s)
            }
            Variation::Horseshoe => {
                let k = 1.0 / (r + EPS);
                Vector2::new((x - y) * (x + y) * k, 2.0 * x * y * k)
            }
            Variation::Polar => Vector2::new(theta / PI, r - 1.0),
            Variation::Handkerchief => {
                Vector2::new(r * (theta + r).sin(), r * (theta - r).cos())
            }
            Variation::Heart => {
                let (s, c) = (theta * r).sin_cos();
                Vector2::new(r * s, -r * c)
            }
            Variation::Disc => {
                let k = theta / PI;
                let (s, c) = (PI * r).sin_cos();
                Vector2::new(k * s, k * c)
            }
            Variation::Spiral => {
                let k = 1.0 / (r + EPS);
                let (sr, cr) = r.sin_cos();
                let (st, ct) = theta.sin_cos();
                Vector2::new(k * (ct + sr), k * (st - cr))
            }
            Variation::Hyperbolic => {
                let (st, ct) = theta.sin_cos();
                Vector2::new(st / (r + EPS), r * ct)
            }
            Variation::Diamond => {
                let (sr, cr) = r.sin_cos();
                let (st, ct) = theta.sin_cos();
                Vector2::new(st * cr, ct * sr)
            }
            Variation::Ex => {
                let p0 = (theta + r).sin().powi(3);
                let p1 = (theta - r).cos().powi(3);
                Vector2::new(r * (p0 + p1), r * (p0 - p1))
            }
            Variation::Julia => {
                let omega = if rng.gen::<bool>() { PI } else { 0.0 };
                let (s, c) = (theta / 2.0 + omega).sin_cos();
                let k = r.sqrt();
                Vector2::new(k * c, k * s)
            }
            Variation::Bent => match (x >= 0.0, y >= 0.0) {
                (true, true) => Vector2::new(x, y),
                (false, true) => Vector2::new(2.0 * x, y),
                (true, false) => Vector2::new(x, y / 2.0),
                (false, false) => Vector2::new(2.0 * x, y / 2.0),
            },
            Variation::Waves => {
                let [b, c, e, f] = *params;
                Vector2::new(x + b * (y / (c * c)).sin(), y + e * (x / (f * f)).sin())
            }
            Variation::Fisheye => {
                let k = 2.0 / (r + 1.0);
                Vector2::new(k * y, k * x)
            }
            Variation::Popcorn => {
                let (c, f) = (params[0], params[1]);
                Vector2::new(
                    x + c * (3.0 * y).tan().sin(),
                    y + f * (3.0 * x).tan().sin(),
                )
            }
            Variation::Exponential => {
                let k = (x - 1.0).exp();
                let (s, c) = (PI * y).sin_cos();
                Vector2::new(k * c, k * s)
            }
            Variation::Power => {
                let (st, ct) = theta.sin_cos();
                let k = r.powf(st);
                Vector2::new(k * ct, k * st)
            }
            Variation::Cosine => Vector2::new(
                (PI * x).cos() * y.cosh(),
                -(PI * x).sin() * y.sinh(),
            ),
            Variation::Rings => {
                let c2 = params[0] * params[0];
                let k = ((r + c2) % (2.0 * c2)) - c2 + r * (1.0 - c2);
                let (st, ct) = theta.sin_cos();
                Vector2::new(k * ct, k * st)
            }
            Variation::Fan => {
                let (c, f) = (params[0], params[1]);
                let span = PI * c * c;
                let turn = if (theta + f) % span > span / 2.0 {
                    theta - span / 2.0
                } else {
                    theta + span / 2.0
                };
                let (s, c) = turn.sin_cos();
                Vector2::new(r * c, r * s)
            }
            Variation::Blob => {
                let [high, low, waves, _] = *params;
                let k = r * (low + (high - low) / 2.0 * ((waves * theta).sin() + 1.0));
                let (st, ct) = theta.sin_cos();
                Vector2::new(k * ct, k * st)
            }
            Variation::Pdj => {
                let [a, b, c, d] = *params;
                Vector2::new((a * y).sin() - (b * x).cos(), (c * x).sin() - (d * y).cos())
            }
            Variation::Fan2 => {
                let p1 = PI * params[0] * params[0];
                let p2 = params[1];
                let t = theta + p2 - p1 * (2.0 * theta * p2 / p1).trunc();
                let turn = if t > p1 / 2.0 {
                    theta - p1 / 2.0
                } else {
                    theta + p1 / 2.0
                };
                let (s, c) = turn.sin_cos();
                Vector2::new(r * s, r * c)
            }
            Variation::Rings2 => {
                let p = params[0] * params[0];
                let k = r - 2.0 * p * ((r + p) / (2.0 * p)).trunc() + r * (1.0 - p);
                let (st, ct) = theta.sin_cos();
                Vector2::new(k * st, k * ct)
            }
            Variation::Eyefish => {
                let k = 2.0 / (r + 1.0);
                Vector2::new(k * x, k * y)
            }
            Variation::Bubble => {
                let k = 4.0 / (r2 + 4.0);
                Vector2::new(k * x, k * y)
            }
            Variation::Cylinder => Vector2::new(x.sin(), y),
            Variation::Perspective => {
                let [angle, dist, _, _] = *params;
                let (s, c) = angle.sin_cos();
                let k = dist / (dist - y * s);
                Vector2::new(k * x, k * y * c)
            }
        }
    }
}

/// A catalog entry resolved for one genome: its id as the genome
/// stores it, its weight and its parameter row.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundVariation {
    /// The id this entry was requested under.
    pub id: usize,
    /// The formula it resolved to.
    pub variation: Variation,
    /// Scale applied to the contribution.
    pub weight: f64,
    /// The genome's parameter row for `id`.
    pub params: [f64; 4],
}

impl BoundVariation {
    /// Resolve `id` against the catalog.
    pub fn new(id: usize, weight: f64, params: [f64; 4]) -> Result<Self, FlameError> {
        Ok(BoundVariation {
            id,
            variation: Variation::from_id(id)?,
            weight,
            params,
        })
    }

    /// The weighted contribution at `t`.
    #[inline]
    pub fn apply<R: Rng + ?Sized>(&self, t: &Vector2, rng: &mut R) -> Vector2 {
        let mut v = self.variation.apply(t, &self.params, rng);
        v.scale(self.weight);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn close(a: Vector2, b: Vector2) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn every_catalog_id_resolves() {
        for id in 0..NUM_VARIATIONS {
            assert!(Variation::from_id(id).is_ok(), "id {} failed", id);
        }
    }

    #[test]
    fn ids_round_trip_outside_the_reserved_slot() {
        for id in 0..RESERVED_VARIATION {
            assert_eq!(Variation::from_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn reserved_id_is_substituted() {
        assert_eq!(
            Variation::from_id(RESERVED_VARIATION).unwrap(),
            NOISE_SUBSTITUTE
        );
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        assert_eq!(
            Variation::from_id(NUM_VARIATIONS),
            Err(FlameError::UnknownVariation(NUM_VARIATIONS))
        );
        assert!(BoundVariation::new(99, 1.0, [0.0; 4]).is_err());
    }

    #[test]
    fn simple_formulas_match_by_hand() {
        let mut rng = SmallRng::seed_from_u64(1);
        let p = [0.0; 4];
        let t = Vector2::new(0.5, -0.25);
        assert!(close(Variation::Linear.apply(&t, &p, &mut rng), t));
        assert!(close(
            Variation::Sinusoidal.apply(&t, &p, &mut rng),
            Vector2::new(0.5f64.sin(), (-0.25f64).sin())
        ));
        assert!(close(
            Variation::Cylinder.apply(&t, &p, &mut rng),
            Vector2::new(0.5f64.sin(), -0.25)
        ));
        assert!(close(
            Variation::Bent.apply(&t, &p, &mut rng),
            Vector2::new(0.5, -0.125)
        ));
        let k = 4.0 / (t.norm_sqr() + 4.0);
        assert!(close(
            Variation::Bubble.apply(&t, &p, &mut rng),
            Vector2::new(0.5 * k, -0.25 * k)
        ));
    }

    #[test]
    fn spherical_inverts_the_unit_circle_onto_itself() {
        let mut rng = SmallRng::seed_from_u64(1);
        let t = Vector2::new(0.6, 0.8);
        assert!(close(Variation::Spherical.apply(&t, &[0.0; 4], &mut rng), t));
    }

    #[test]
    fn julia_lands_on_one_of_two_roots() {
        let mut rng = SmallRng::seed_from_u64(7);
        let t = Vector2::new(0.0, 4.0);
        for _ in 0..16 {
            let v = Variation::Julia.apply(&t, &[0.0; 4], &mut rng);
            assert!((v.norm_sqr() - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bound_variation_applies_its_weight() {
        let mut rng = SmallRng::seed_from_u64(3);
        let bound = BoundVariation::new(0, 0.5, [0.0; 4]).unwrap();
        let v = bound.apply(&Vector2::new(2.0, -4.0), &mut rng);
        assert_eq!(v, Vector2::new(1.0, -2.0));
    }

    #[test]
    fn parameterised_variations_read_their_row() {
        let mut rng = SmallRng::seed_from_u64(3);
        let t = Vector2::new(0.3, 0.7);
        let flat = Variation::Pdj.apply(&t, &[0.0; 4], &mut rng);
        assert!(close(flat, Vector2::new(-1.0, -1.0)));
        let tuned = Variation::Pdj.apply(&t, &[1.0, 1.0, 1.0, 1.0], &mut rng);
        assert!(!close(flat, tuned));
    }
}
