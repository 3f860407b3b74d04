// src/mc/simulator.rs
//! Heston path generation
//!
//! # Algorithm
//!
//! For every path and day `t = 0..days-1`, with `Δt = T / days`:
//! 1. Draw a correlated normal pair `(Z_price, Z_vol)` with correlation ρ
//! 2. Scale both by `√Δt`
//! 3. Advance price and variance with [`Heston::step`]
//! 4. Record the new price (and variance) in column `t`
//!
//! Column 0 therefore holds the state after the first step, not `S0`.
//!
//! # Parallelism
//!
//! Paths run on the rayon pool. Each path draws from its own stream derived
//! from `seed` and the path index, so a seeded run is bit-identical regardless of
//! thread count, and path `i` of an `n`-path run equals path `i` of any larger
//! run with the same seed.

use crate::error::{validation::*, SdeError, SdeResult};
use crate::models::heston::{Heston, HestonParams, VarianceScheme};
use crate::models::perturbation::{NoPerturbation, ThetaPerturbation};
use crate::rng::{self, RngFactory};
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct SimulationRequest {
    pub s0: f64,
    pub t: f64,
    pub r: f64,
    pub params: HestonParams,
    pub days: usize,
    pub n_paths: usize,
    pub return_variance: bool,
    pub seed: Option<u64>,
    pub scheme: VarianceScheme,
}

impl SimulationRequest {
    pub fn validate(&self) -> SdeResult<()> {
        validate_positive("s0", self.s0)?;
        validate_finite("s0", self.s0)?;
        validate_positive("t", self.t)?;
        validate_finite("t", self.t)?;
        validate_finite("r", self.r)?;
        validate_count("days", self.days, 1)?;
        validate_count("n_paths", self.n_paths, 1)?;
        self.params.validate()
    }

    /// Step size in years
    pub fn dt(&self) -> f64 {
        self.t / self.days as f64
    }
}

impl Default for SimulationRequest {
    fn default() -> Self {
        SimulationRequest {
            s0: 56.0,
            t: 2.0 / 12.0,
            r: 1.0,
            params: HestonParams::default(),
            days: 60,
            n_paths: 1,
            return_variance: false,
            seed: None,
            scheme: VarianceScheme::default(),
        }
    }
}

/// Simulated trajectories, one row per path and one column per day
#[derive(Clone, Debug)]
pub struct PathResult {
    pub prices: Array2<f64>,
    pub variances: Option<Array2<f64>>,
    /// Base seed the paths were drawn with
    pub seed: u64,
}

impl PathResult {
    pub fn n_paths(&self) -> usize {
        self.prices.nrows()
    }

    pub fn days(&self) -> usize {
        self.prices.ncols()
    }

    pub fn path(&self, index: usize) -> ArrayView1<'_, f64> {
        self.prices.index_axis(Axis(0), index)
    }

    /// Prices of path 0
    pub fn first_path(&self) -> Vec<f64> {
        self.path(0).to_vec()
    }

    /// Prices on the last simulated day, one per path
    pub fn terminal_prices(&self) -> Vec<f64> {
        self.prices.column(self.days() - 1).to_vec()
    }
}

/// Simulate Heston paths with a constant long-run variance
pub fn simulate(req: &SimulationRequest) -> SdeResult<PathResult> {
    simulate_with_perturbation(req, &NoPerturbation)
}

/// Simulate Heston paths with θ scaled day by day by `perturbation`
pub fn simulate_with_perturbation<P>(req: &SimulationRequest, perturbation: &P) -> SdeResult<PathResult>
where
    P: ThetaPerturbation + ?Sized,
{
    req.validate()?;
    let heston = Heston::new_with_scheme(req.params, req.r, req.scheme)?;
    let factory = RngFactory::from_optional_seed(req.seed);
    let dt = req.dt();

    let thetas = (0..req.days)
        .map(|day| {
            let multiplier = perturbation.theta_multiplier(day);
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(SdeError::InvalidParameters {
                    parameter: format!("theta multiplier (day {})", day),
                    value: multiplier,
                    constraint: "must be finite and non-negative".to_string(),
                });
            }
            Ok(req.params.theta * multiplier)
        })
        .collect::<SdeResult<Vec<f64>>>()?;

    if !req.params.feller_condition() {
        debug!(params = ?req.params, "Feller condition violated for simulated parameters");
    }

    debug!(
        n_paths = req.n_paths,
        days = req.days,
        seed = factory.base_seed(),
        scheme = heston.scheme_name(),
        "simulating Heston paths"
    );

    let paths = (0..req.n_paths)
        .into_par_iter()
        .map(|i| simulate_single_path(&heston, &factory, i, req, &thetas, dt))
        .collect::<SdeResult<Vec<(Vec<f64>, Vec<f64>)>>>()?;

    let mut flat_prices = Vec::with_capacity(req.n_paths * req.days);
    let mut flat_variances = Vec::with_capacity(if req.return_variance {
        req.n_paths * req.days
    } else {
        0
    });
    for (prices, variances) in paths {
        flat_prices.extend(prices);
        flat_variances.extend(variances);
    }

    let shape = (req.n_paths, req.days);
    let prices = to_matrix(shape, flat_prices)?;
    let variances = if req.return_variance {
        Some(to_matrix(shape, flat_variances)?)
    } else {
        None
    };

    Ok(PathResult {
        prices,
        variances,
        seed: factory.base_seed(),
    })
}

fn simulate_single_path(
    heston: &Heston,
    factory: &RngFactory,
    path_id: usize,
    req: &SimulationRequest,
    thetas: &[f64],
    dt: f64,
) -> SdeResult<(Vec<f64>, Vec<f64>)> {
    let mut rng = factory.create_std_rng(path_id as u64);
    let sqrt_dt = dt.sqrt();

    let mut prices = Vec::with_capacity(req.days);
    let mut variances = Vec::with_capacity(if req.return_variance { req.days } else { 0 });

    let mut s = req.s0;
    let mut v = req.params.v0;

    for (day, &theta) in thetas.iter().enumerate() {
        let (z_price, z_vol) = rng::correlated_normal_pair(&mut rng, heston.params.rho);
        heston.step(&mut s, &mut v, dt, theta, z_price * sqrt_dt, z_vol * sqrt_dt);

        if !s.is_finite() || s <= 0.0 || !v.is_finite() {
            return Err(SdeError::NumericalInstability {
                method: format!("Heston {}", heston.scheme_name()),
                reason: format!(
                    "path {} left the valid domain on day {} (price = {}, variance = {})",
                    path_id, day, s, v
                ),
            });
        }

        prices.push(s);
        if req.return_variance {
            variances.push(v);
        }
    }

    Ok((prices, variances))
}

fn to_matrix(shape: (usize, usize), data: Vec<f64>) -> SdeResult<Array2<f64>> {
    Array2::from_shape_vec(shape, data).map_err(|e| SdeError::NumericalInstability {
        method: "path assembly".to_string(),
        reason: e.to_string(),
    })
}
