// src/analytics/path_stats.rs
//! Cross-sectional statistics of simulated paths
//!
//! For a price matrix with one row per path, statistics are taken down each
//! column, giving the envelope of the simulated distribution day by day.
//! Sample variances use the `n - 1` denominator and are reported as zero for a
//! single path.

use crate::error::{validation::*, SdeResult};
use ndarray::Array2;
use statrs::statistics::Statistics;

#[derive(Debug, Clone, PartialEq)]
pub struct PathStatistics {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl PathStatistics {
    pub fn from_paths(paths: &Array2<f64>) -> Self {
        let n_paths = paths.nrows();
        let mut stats = PathStatistics {
            mean: Vec::with_capacity(paths.ncols()),
            variance: Vec::with_capacity(paths.ncols()),
            min: Vec::with_capacity(paths.ncols()),
            max: Vec::with_capacity(paths.ncols()),
        };

        for column in paths.columns() {
            stats.mean.push(column.iter().mean());
            stats.variance.push(if n_paths > 1 {
                column.iter().variance()
            } else {
                0.0
            });
            stats.min.push(Statistics::min(column.iter()));
            stats.max.push(Statistics::max(column.iter()));
        }

        stats
    }

    pub fn days(&self) -> usize {
        self.mean.len()
    }

    pub fn terminal_mean(&self) -> f64 {
        self.mean.last().copied().unwrap_or(f64::NAN)
    }

    pub fn terminal_std_dev(&self) -> f64 {
        self.variance.last().copied().unwrap_or(f64::NAN).sqrt()
    }
}

/// Price path with all volatility switched off: `S0·exp(r·(k+1)·Δt)`.
///
/// Matches the column convention of the simulator, where column `k` holds
/// the state after `k + 1` steps.
pub fn deterministic_drift_path(s0: f64, r: f64, t: f64, days: usize) -> SdeResult<Vec<f64>> {
    validate_positive("s0", s0)?;
    validate_positive("t", t)?;
    validate_finite("r", r)?;
    validate_count("days", days, 1)?;

    let dt = t / days as f64;
    Ok((1..=days).map(|k| s0 * (r * dt * k as f64).exp()).collect())
}
