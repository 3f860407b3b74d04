// src/calibration/calibrator.rs
//! Least-squares calibration of Heston parameters to an observed price window
//!
//! # Objective
//!
//! For a candidate parameter vector `p = (κ, θ, v0, ρ, ξ)` the residual is
//! ```text
//! r_k(p) = S_k(p) - S_k^obs,   k = 0..days-1
//! ```
//! where `S(p)` is path 0 of a seeded simulation. The same seed is used for
//! every evaluation of one calibration run (common random numbers), which
//! makes `r(p)` a deterministic, piecewise-smooth function the
//! Levenberg-Marquardt solver can work with.
//!
//! # Jacobian
//!
//! Forward differences, one column per parameter, evaluated on the rayon
//! pool. When the forward trial leaves the simulator's domain (|ρ| > 1,
//! v0 < 0) the column falls back to a backward difference.
//!
//! # Termination
//!
//! The solver stops on its own convergence tests, when the evaluation budget
//! (`patience`) runs out, or when the optional wall-clock budget expires.
//! The best parameters seen are returned in every case and
//! [`CalibrationResult::converged`] tells the cases apart.

use super::bounds::ParameterBounds;
use super::residuals::{finite_difference_step, penalty_residuals, residuals, sum_of_squares};
use super::window::ObservedWindow;
use crate::error::{validation::*, SdeError, SdeResult};
use crate::mc::simulator::{simulate, SimulationRequest};
use crate::models::heston::{HestonParams, VarianceScheme, PARAM_COUNT};
use crate::rng;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{DMatrix, DVector, Dyn, Owned};
use rayon::prelude::*;
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct CalibrationConfig {
    pub s0: f64,
    pub t: f64,
    pub r: f64,
    /// Simulated days; must equal the observed window length
    pub days: usize,
    pub n_paths: usize,
    /// Common seed for every trial; drawn once per run when `None`
    pub seed: Option<u64>,
    pub scheme: VarianceScheme,
    /// Evaluation budget passed to the solver
    pub patience: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub time_budget: Option<Duration>,
    pub bounds: Option<ParameterBounds>,
}

impl CalibrationConfig {
    pub fn validate(&self) -> SdeResult<()> {
        validate_positive("s0", self.s0)?;
        validate_finite("s0", self.s0)?;
        validate_positive("t", self.t)?;
        validate_finite("t", self.t)?;
        validate_finite("r", self.r)?;
        validate_count("days", self.days, 1)?;
        validate_count("n_paths", self.n_paths, 1)?;
        validate_count("patience", self.patience, 1)?;
        for (name, tol) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            validate_non_negative(name, tol)?;
            validate_finite(name, tol)?;
        }
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            s0: 56.0,
            t: 1.0 / 12.0,
            r: 1.0,
            days: 30,
            n_paths: 1,
            seed: None,
            scheme: VarianceScheme::default(),
            patience: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
            time_budget: None,
            bounds: None,
        }
    }
}

/// Why the solver stopped
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Converged,
    EvaluationBudget,
    TimeBudget,
    Stopped(String),
}

#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub params: HestonParams,
    /// `simulated - observed` at `params`
    pub residuals: Vec<f64>,
    pub sse: f64,
    pub converged: bool,
    pub termination: Termination,
    pub evaluations: usize,
    pub seed: u64,
}

impl CalibrationResult {
    pub fn rmse(&self) -> f64 {
        (self.sse / self.residuals.len() as f64).sqrt()
    }
}

/// Everything needed to turn a parameter vector into residuals.
///
/// Shared read-only across the Jacobian columns.
#[derive(Debug, Clone)]
struct ResidualModel {
    s0: f64,
    t: f64,
    r: f64,
    days: usize,
    n_paths: usize,
    seed: u64,
    scheme: VarianceScheme,
    bounds: Option<ParameterBounds>,
    observed: Vec<f64>,
}

impl ResidualModel {
    fn effective(&self, params: &HestonParams) -> HestonParams {
        match &self.bounds {
            Some(bounds) => bounds.project(params),
            None => *params,
        }
    }

    fn evaluate(&self, params: &HestonParams) -> SdeResult<Vec<f64>> {
        let req = SimulationRequest {
            s0: self.s0,
            t: self.t,
            r: self.r,
            params: self.effective(params),
            days: self.days,
            n_paths: self.n_paths,
            return_variance: false,
            seed: Some(self.seed),
            scheme: self.scheme,
        };
        let paths = simulate(&req)?;
        residuals(&paths.first_path(), &self.observed)
    }

    fn evaluate_array(&self, values: [f64; PARAM_COUNT]) -> SdeResult<Vec<f64>> {
        self.evaluate(&HestonParams::from_array(values))
    }
}

#[derive(Debug, Clone)]
struct Trial {
    params: HestonParams,
    residuals: Vec<f64>,
    sse: f64,
}

/// Levenberg-Marquardt view of one calibration run
struct CalibrationProblem {
    model: ResidualModel,
    params: DVector<f64>,
    best: RefCell<Trial>,
    started: Instant,
    time_budget: Option<Duration>,
    timed_out: Cell<bool>,
}

impl CalibrationProblem {
    fn out_of_time(&self) -> bool {
        if let Some(budget) = self.time_budget {
            if self.started.elapsed() >= budget {
                if !self.timed_out.replace(true) {
                    warn!(budget_ms = budget.as_millis() as u64, "calibration time budget exhausted");
                }
                return true;
            }
        }
        false
    }

    fn current(&self) -> HestonParams {
        HestonParams::from(&self.params)
    }

    fn record(&self, params: HestonParams, residuals: &[f64]) {
        let sse = sum_of_squares(residuals);
        let mut best = self.best.borrow_mut();
        if sse < best.sse {
            debug!(sse, kappa = params.kappa, theta = params.theta, v0 = params.v0,
                rho = params.rho, xi = params.xi, "calibration improved");
            *best = Trial {
                params,
                residuals: residuals.to_vec(),
                sse,
            };
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CalibrationProblem {
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        if self.out_of_time() {
            return None;
        }

        let params = self.current();
        let values = match self.model.evaluate(&params) {
            Ok(values) => {
                self.record(params, &values);
                values
            }
            Err(err) => {
                debug!(error = %err, "trial rejected");
                penalty_residuals(self.model.days)
            }
        };
        Some(DVector::from_vec(values))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        if self.out_of_time() {
            return None;
        }

        let x = self.current().to_array();
        let model = &self.model;
        let base = match model.evaluate_array(x) {
            Ok(base) => base,
            Err(err) => {
                debug!(error = %err, "jacobian requested at an invalid point");
                return None;
            }
        };

        let columns = (0..PARAM_COUNT)
            .into_par_iter()
            .map(|j| {
                let h = finite_difference_step(x[j]);

                let mut forward = x;
                forward[j] += h;
                if let Ok(up) = model.evaluate_array(forward) {
                    return up.iter().zip(&base).map(|(u, b)| (u - b) / h).collect();
                }

                let mut backward = x;
                backward[j] -= h;
                match model.evaluate_array(backward) {
                    Ok(down) => base.iter().zip(&down).map(|(b, d)| (b - d) / h).collect(),
                    Err(_) => vec![0.0; base.len()],
                }
            })
            .collect::<Vec<Vec<f64>>>();

        Some(DMatrix::from_fn(base.len(), PARAM_COUNT, |i, j| columns[j][i]))
    }
}

/// Calibrates Heston parameters against one observed window
#[derive(Debug, Clone)]
pub struct HestonCalibrator {
    pub config: CalibrationConfig,
    pub observed: ObservedWindow,
}

impl HestonCalibrator {
    pub fn new(config: CalibrationConfig, observed: ObservedWindow) -> SdeResult<Self> {
        config.validate()?;
        validate_same_length("calibration window", config.days, observed.len())?;
        if observed.len() < PARAM_COUNT {
            return Err(SdeError::InvalidConfiguration {
                field: "observed window".to_string(),
                reason: format!(
                    "needs at least {} samples to fit {} parameters, got {}",
                    PARAM_COUNT,
                    PARAM_COUNT,
                    observed.len()
                ),
            });
        }
        Ok(HestonCalibrator { config, observed })
    }

    pub fn calibrate(&self, initial_guess: HestonParams) -> SdeResult<CalibrationResult> {
        if !initial_guess.is_finite() {
            return Err(SdeError::InvalidParameters {
                parameter: "initial guess".to_string(),
                value: f64::NAN,
                constraint: "all parameters must be finite".to_string(),
            });
        }

        let cfg = &self.config;
        let seed = cfg.seed.unwrap_or_else(rng::fresh_seed);
        let model = ResidualModel {
            s0: cfg.s0,
            t: cfg.t,
            r: cfg.r,
            days: cfg.days,
            n_paths: cfg.n_paths,
            seed,
            scheme: cfg.scheme,
            bounds: cfg.bounds,
            observed: self.observed.prices(),
        };

        // The starting point must be evaluable; later trials may fail and are penalised
        let initial = model.effective(&initial_guess);
        let initial_residuals = model.evaluate(&initial)?;
        let initial_sse = sum_of_squares(&initial_residuals);

        info!(
            days = cfg.days,
            seed,
            initial_sse,
            bounded = cfg.bounds.is_some(),
            "starting Heston calibration"
        );

        if initial_sse == 0.0 {
            return Ok(CalibrationResult {
                params: initial,
                residuals: initial_residuals,
                sse: 0.0,
                converged: true,
                termination: Termination::Converged,
                evaluations: 1,
                seed,
            });
        }

        let problem = CalibrationProblem {
            model,
            params: initial.into(),
            best: RefCell::new(Trial {
                params: initial,
                residuals: initial_residuals,
                sse: initial_sse,
            }),
            started: Instant::now(),
            time_budget: cfg.time_budget,
            timed_out: Cell::new(false),
        };

        let (problem, report) = LevenbergMarquardt::new()
            .with_ftol(cfg.ftol)
            .with_xtol(cfg.xtol)
            .with_gtol(cfg.gtol)
            .with_patience(cfg.patience)
            .minimize(problem);

        let termination = if problem.timed_out.get() {
            Termination::TimeBudget
        } else if report.termination.was_successful() {
            Termination::Converged
        } else if matches!(report.termination, TerminationReason::LostPatience) {
            Termination::EvaluationBudget
        } else {
            Termination::Stopped(format!("{:?}", report.termination))
        };

        let best = problem.best.into_inner();
        if !best.sse.is_finite() {
            return Err(SdeError::CalibrationError {
                reason: format!("no finite trial after {:?}", report.termination),
                current_error: Some(best.sse),
            });
        }

        let fitted = problem.model.effective(&best.params);
        fitted.warn_if_feller_violated();

        info!(
            sse = best.sse,
            evaluations = report.number_of_evaluations,
            termination = ?termination,
            "Heston calibration finished"
        );

        Ok(CalibrationResult {
            params: fitted,
            residuals: best.residuals,
            sse: best.sse,
            converged: termination == Termination::Converged,
            termination,
            evaluations: report.number_of_evaluations,
            seed,
        })
    }
}

/// Fit Heston parameters to `observed`, starting from `initial_guess`
pub fn calibrate(
    config: &CalibrationConfig,
    observed: &ObservedWindow,
    initial_guess: HestonParams,
) -> SdeResult<CalibrationResult> {
    HestonCalibrator::new(config.clone(), observed.clone())?.calibrate(initial_guess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use tracing_test::traced_test;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 4, 11).unwrap()
    }

    fn synthetic(params: HestonParams, cfg: &CalibrationConfig) -> ObservedWindow {
        let req = SimulationRequest {
            s0: cfg.s0,
            t: cfg.t,
            r: cfg.r,
            params,
            days: cfg.days,
            n_paths: 1,
            seed: cfg.seed,
            ..Default::default()
        };
        let prices = simulate(&req).unwrap().first_path();
        ObservedWindow::from_daily(start(), &prices).unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let cfg = CalibrationConfig { days: 60, ..Default::default() };
        let window = ObservedWindow::from_daily(start(), &[56.0; 30]).unwrap();

        let err = calibrate(&cfg, &window, HestonParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_too_short_window_rejected() {
        let cfg = CalibrationConfig { days: 3, ..Default::default() };
        let window = ObservedWindow::from_daily(start(), &[56.0, 56.1, 56.2]).unwrap();
        assert!(HestonCalibrator::new(cfg, window).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let window = ObservedWindow::from_daily(start(), &[56.0; 30]).unwrap();
        for cfg in [
            CalibrationConfig { s0: 0.0, ..Default::default() },
            CalibrationConfig { t: -1.0, ..Default::default() },
            CalibrationConfig { n_paths: 0, ..Default::default() },
        ] {
            let err = calibrate(&cfg, &window, HestonParams::default()).unwrap_err();
            assert!(err.is_invalid_argument(), "{}", err);
        }
    }

    #[test]
    fn test_invalid_initial_guess_rejected() {
        let cfg = CalibrationConfig { seed: Some(1), ..Default::default() };
        let window = ObservedWindow::from_daily(start(), &[56.0; 30]).unwrap();
        let guess = HestonParams { rho: 2.0, ..Default::default() };

        let err = calibrate(&cfg, &window, guess).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_exact_start_returns_immediately() {
        let cfg = CalibrationConfig { seed: Some(17), ..Default::default() };
        let truth = HestonParams::default();
        let window = synthetic(truth, &cfg);

        let result = calibrate(&cfg, &window, truth).unwrap();
        assert!(result.converged);
        assert_eq!(result.sse, 0.0);
        assert_eq!(result.params, truth);
        assert_eq!(result.seed, 17);
    }

    #[test]
    fn test_calibration_never_worsens_initial_fit() {
        let cfg = CalibrationConfig { seed: Some(4), patience: 10, ..Default::default() };
        let window = ObservedWindow::from_daily(
            start(),
            &(0..30).map(|i| 56.0 + 0.1 * i as f64).collect::<Vec<_>>(),
        )
        .unwrap();

        let guess = HestonParams::default();
        let initial = ResidualModel {
            s0: cfg.s0,
            t: cfg.t,
            r: cfg.r,
            days: cfg.days,
            n_paths: cfg.n_paths,
            seed: 4,
            scheme: cfg.scheme,
            bounds: None,
            observed: window.prices(),
        }
        .evaluate(&guess)
        .unwrap();

        let result = calibrate(&cfg, &window, guess).unwrap();
        assert!(result.sse <= sum_of_squares(&initial));
        assert_eq!(result.residuals.len(), 30);
        assert!(result.params.is_finite());
    }

    #[test]
    fn test_bounded_calibration_stays_in_box() {
        let bounds = ParameterBounds::conventional();
        let cfg = CalibrationConfig {
            seed: Some(8),
            bounds: Some(bounds),
            patience: 20,
            ..Default::default()
        };
        let window = ObservedWindow::from_daily(
            start(),
            &(0..30).map(|i| 56.0 * (1.0 + 0.02 * (i as f64 * 0.7).sin())).collect::<Vec<_>>(),
        )
        .unwrap();

        let result = calibrate(&cfg, &window, HestonParams::default()).unwrap();
        assert!(bounds.contains(&result.params), "{:?}", result.params);
    }

    #[test]
    fn test_zero_time_budget_stops_immediately() {
        let cfg = CalibrationConfig {
            seed: Some(2),
            time_budget: Some(Duration::ZERO),
            ..Default::default()
        };
        let window = ObservedWindow::from_daily(start(), &[57.0; 30]).unwrap();
        let guess = HestonParams::default();

        let result = calibrate(&cfg, &window, guess).unwrap();
        assert_eq!(result.termination, Termination::TimeBudget);
        assert!(!result.converged);
        assert_eq!(result.params, guess);
    }

    #[test]
    #[traced_test]
    fn test_calibration_logs_progress() {
        let cfg = CalibrationConfig { seed: Some(6), patience: 3, ..Default::default() };
        let window = ObservedWindow::from_daily(start(), &[58.0; 30]).unwrap();

        calibrate(&cfg, &window, HestonParams::default()).unwrap();

        assert!(logs_contain("starting Heston calibration"));
        assert!(logs_contain("Heston calibration finished"));
    }
}
