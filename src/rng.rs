// src/rng.rs
//! Random Number Generation for Path Simulation
//!
//! # Streams
//!
//! Every simulated path owns an independent `StdRng` stream seeded from
//! `base_seed ^ (path_id · φ64)`, where φ64 is the 64-bit golden-ratio
//! constant. Output therefore depends only on the base seed and the path
//! index, never on how rayon schedules the paths. The multiplication keeps
//! runs with nearby base seeds from sharing streams.
//!
//! # Correlated Shocks
//!
//! The two Brownian increments of the price/variance system are built from two
//! independent standard normals:
//! ```text
//! Z_price = Z₁
//! Z_vol   = ρ Z₁ + √(1 - ρ²) Z₂
//! ```
//! which has unit variances and correlation ρ. At ρ = ±1 the second term
//! vanishes and the pair is perfectly (anti-)correlated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Odd 64-bit constant ⌊2⁶⁴/φ⌋ used to spread path indices over the seed space
const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Factory for per-path RNG streams sharing one base seed
#[derive(Debug, Clone, Copy)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Use the caller's seed when given, otherwise draw a fresh one
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(fresh_seed))
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Stream for one path
    pub fn create_std_rng(&self, path_id: u64) -> StdRng {
        StdRng::seed_from_u64(self.base_seed ^ path_id.wrapping_mul(STREAM_MIX))
    }
}

/// Base seed for a second family of streams derived from `seed`.
///
/// SplitMix64 finaliser over `seed + φ64·(family + 1)`; distinct families
/// of one seed give unrelated base seeds.
pub fn derive_seed(seed: u64, family: u64) -> u64 {
    let mut z = seed.wrapping_add(STREAM_MIX.wrapping_mul(family.wrapping_add(1)));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed drawn from the thread-local generator
pub fn fresh_seed() -> u64 {
    rand::thread_rng().gen()
}

pub fn get_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

/// Draw a unit-variance normal pair with correlation `rho`.
///
/// `rho` must lie in [-1, 1].
pub fn correlated_normal_pair<R: Rng + ?Sized>(rng: &mut R, rho: f64) -> (f64, f64) {
    let z1 = get_normal_draw(rng);
    let z2 = get_normal_draw(rng);
    let complement = (1.0 - rho * rho).max(0.0).sqrt();
    (z1, rho * z1 + complement * z2)
}
