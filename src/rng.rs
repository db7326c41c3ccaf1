// src/rng.rs
//! Random Number Generation for Monte Carlo Simulations
//!
//! # Design Philosophy
//!
//! Shark-fin pricing needs deviates that are:
//! 1. **Reproducible**: same seed set → bit-identical draws, regardless of thread count
//!    (finite-difference Greeks rely on common random numbers)
//! 2. **Parallel safe**: one independent stream per seed block
//! 3. **Optionally low-discrepancy**: a scrambled Sobol sequence for quasi Monte Carlo
//!
//! # Pseudo-random blocks
//!
//! The deviate matrix is split into one contiguous row block per seed. Block `b` is
//! filled from `StdRng::seed_from_u64(seeds[b])`, so the output depends only on the
//! seed list and the matrix shape. Blocks are generated in parallel and concatenated
//! in seed order.
//!
//! # Quasi-random rows
//!
//! Each row is one point of a `cols`-dimensional Sobol sequence, mapped to a normal
//! deviate per coordinate through the inverse normal CDF:
//! ```text
//! Z = Φ⁻¹(U),   U ∈ (0, 1)
//! ```
//! The sequence is inherently sequential, so quasi generation runs on one thread.

use crate::config::SimulationControls;
use crate::error::{SharkfinError, SharkfinResult};
use crate::math_utils::norm_inv_cdf;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

pub fn seed_rng_from_u64(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn get_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

/// `2⁻⁵³`; points keep the top 53 bits so every coordinate lies strictly in (0, 1).
const INV_2_POW_53: f64 = 1.0 / 9_007_199_254_740_992.0;
pub const SOBOL_MAX_DIMENSIONS: usize = 21_201;

/// Scrambled Sobol sequence.
///
/// Dimension 0 uses the canonical direction numbers; higher dimensions use
/// seed-derived odd direction numbers with a per-dimension XOR scramble.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    dimensions: usize,
    index: u64,
    x: Vec<u64>,
    directions: Vec<[u64; 64]>,
    scramblers: Vec<u64>,
}

impl SobolSequence {
    pub fn new(dimensions: usize, seed: u64) -> SharkfinResult<Self> {
        if !(1..=SOBOL_MAX_DIMENSIONS).contains(&dimensions) {
            return Err(SharkfinError::invalid_config(
                "rand_cols",
                format!(
                    "quasi-random dimension must be in [1, {}], got {}",
                    SOBOL_MAX_DIMENSIONS, dimensions
                ),
            ));
        }

        let directions = (0..dimensions)
            .map(|dim| build_direction_numbers(dim as u64, seed))
            .collect();
        let scramblers = (0..dimensions)
            .map(|dim| splitmix64(seed ^ ((dim as u64 + 1) << 32)))
            .collect();

        Ok(Self {
            dimensions,
            index: 0,
            x: vec![0_u64; dimensions],
            directions,
            scramblers,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Writes the next point into `out`; `false` once the sequence is exhausted.
    #[inline]
    pub fn next_into(&mut self, out: &mut [f64]) -> bool {
        let next_index = self.index.wrapping_add(1);
        if next_index == 0 {
            return false;
        }
        let c = next_index.trailing_zeros() as usize;
        self.index = next_index;

        for dim in 0..self.dimensions {
            self.x[dim] ^= self.directions[dim][c];
            let scrambled = self.x[dim] ^ self.scramblers[dim];
            out[dim] = ((scrambled >> 11) as f64 + 0.5) * INV_2_POW_53;
        }
        true
    }
}

fn build_direction_numbers(dim: u64, seed: u64) -> [u64; 64] {
    let mut v = [0_u64; 64];
    if dim == 0 {
        for (j, item) in v.iter_mut().enumerate() {
            *item = 1_u64 << (63 - j);
        }
        return v;
    }

    for (j, item) in v.iter_mut().enumerate() {
        let hash = splitmix64(seed ^ ((dim + 1) << 40) ^ j as u64);
        let mask = if j == 63 {
            u64::MAX
        } else {
            (1_u64 << (j + 1)) - 1
        };
        let m = (hash | 1) & mask;
        *item = m << (63 - j);
    }
    v
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Standard normal deviates shared by every path of a pricing call.
///
/// With dual-smooth enabled, path `2i` reads row `i` and path `2i + 1` reads the
/// negated row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviateMatrix {
    rows: Array2<f64>,
    dual_smooth: bool,
}

impl DeviateMatrix {
    /// Generates the deviates for `sim`.
    pub fn generate(sim: &SimulationControls) -> SharkfinResult<Self> {
        sim.validate()?;
        let rows = if sim.quasi {
            quasi_rows(sim.rand_rows, sim.rand_cols, sim.seeds[0])?
        } else {
            pseudo_rows(sim.rand_rows, sim.rand_cols, &sim.seeds)?
        };
        Ok(DeviateMatrix {
            rows,
            dual_smooth: sim.dual_smooth,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.rows.dim()
    }

    pub fn dual_smooth(&self) -> bool {
        self.dual_smooth
    }

    /// Row index and sign used by `path`.
    #[inline]
    pub fn row_for(&self, path: usize) -> (usize, f64) {
        if self.dual_smooth {
            (path / 2, if path % 2 == 0 { 1.0 } else { -1.0 })
        } else {
            (path, 1.0)
        }
    }

    /// Deviate driving `step` (0-based) of `path`.
    #[inline]
    pub fn draw(&self, path: usize, step: usize) -> f64 {
        let (row, sign) = self.row_for(path);
        sign * self.rows[[row, step]]
    }
}

fn pseudo_rows(rows: usize, cols: usize, seeds: &[u64]) -> SharkfinResult<Array2<f64>> {
    if seeds.len() > num_cpus::get() {
        tracing::warn!(
            seeds = seeds.len(),
            cores = num_cpus::get(),
            "more seed blocks than logical cores; blocks will queue on the thread pool"
        );
    }
    let block = (rows + seeds.len() - 1) / seeds.len();

    let blocks: Vec<Vec<f64>> = seeds
        .par_iter()
        .enumerate()
        .map(|(b, &seed)| {
            let start = (b * block).min(rows);
            let end = ((b + 1) * block).min(rows);
            let mut rng = seed_rng_from_u64(seed);
            (0..(end - start) * cols)
                .map(|_| get_normal_draw(&mut rng))
                .collect()
        })
        .collect();

    let data: Vec<f64> = blocks.into_iter().flatten().collect();
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| SharkfinError::invalid_config("rand_rows", e.to_string()))
}

fn quasi_rows(rows: usize, cols: usize, seed: u64) -> SharkfinResult<Array2<f64>> {
    let mut sobol = SobolSequence::new(cols, seed)?;
    let mut out = Array2::<f64>::zeros((rows, cols));
    let mut point = vec![0.0; cols];
    for mut row in out.rows_mut() {
        if !sobol.next_into(&mut point) {
            return Err(SharkfinError::invalid_config(
                "rand_rows",
                "quasi-random sequence exhausted",
            ));
        }
        for (z, &u) in row.iter_mut().zip(point.iter()) {
            *z = norm_inv_cdf(u);
        }
    }
    Ok(out)
}
