// src/models/heston.rs
//! Heston Stochastic Volatility Model
//!
//! # Mathematical Framework
//!
//! Price and instantaneous variance follow coupled SDEs:
//! ```text
//! dS_t = r S_t dt + √V_t S_t dW_t^(1)
//! dV_t = κ(θ - V_t) dt + ξ√V_t dW_t^(2)
//! ```
//!
//! Where:
//! - S_t: Asset price
//! - V_t: Instantaneous variance
//! - κ: Mean reversion speed for variance
//! - θ: Long-run variance level
//! - ξ: Volatility of variance (vol-of-vol)
//! - ρ: Correlation between dW_t^(1) and dW_t^(2)
//!
//! # Discretization
//!
//! Log-Euler for the price, Euler-Maruyama for the variance:
//! ```text
//! S_{n+1} = S_n exp((r - V_n/2)Δt + √V_n ΔW_s)
//! V_{n+1} = |V_n + κ(θ - V_n)Δt + ξ√V_n ΔW_v|      (reflection)
//! V_{n+1} = max(0, V_n + κ(θ - V_n)Δt + ξ√V_n ΔW_v) (full truncation)
//! ```
//! Both updates read the variance from the start of the step. The log-Euler
//! price step keeps prices strictly positive and the variance update keeps the
//! variance non-negative, so `√V` is always defined.
//!
//! # Feller Condition
//!
//! `2κθ > ξ²` keeps the continuous process away from zero. It is reported,
//! never enforced: the discretization stays well-defined either way.

use crate::error::{validation::*, SdeResult};
use nalgebra::DVector;
use tracing::warn;

/// Number of calibrated model parameters
pub const PARAM_COUNT: usize = 5;

/// Parameter names in vector order
pub const PARAM_NAMES: [&str; PARAM_COUNT] = ["kappa", "theta", "v0", "rho", "xi"];

/// How negative variance excursions are absorbed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VarianceScheme {
    /// Reflect at zero: `v ← |v|`
    #[default]
    Reflection,
    /// Truncate at zero: `v ← max(v, 0)`
    FullTruncation,
}

impl VarianceScheme {
    pub fn name(&self) -> &'static str {
        match self {
            VarianceScheme::Reflection => "Reflection Euler",
            VarianceScheme::FullTruncation => "Full Truncation Euler",
        }
    }

    #[inline]
    fn absorb(&self, v: f64) -> f64 {
        match self {
            VarianceScheme::Reflection => v.abs(),
            VarianceScheme::FullTruncation => v.max(0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HestonParams {
    pub kappa: f64, // Mean reversion speed
    pub theta: f64, // Long-run variance
    pub v0: f64,    // Initial variance
    pub rho: f64,   // Correlation between price and variance shocks
    pub xi: f64,    // Volatility of variance (vol-of-vol)
}

impl Default for HestonParams {
    /// Starting guess used by the calibrator when none is supplied
    fn default() -> Self {
        HestonParams {
            kappa: 1.2,
            theta: 0.15,
            v0: 0.5,
            rho: 0.25,
            xi: 0.1,
        }
    }
}

impl HestonParams {
    pub fn new(kappa: f64, theta: f64, v0: f64, rho: f64, xi: f64) -> Self {
        HestonParams {
            kappa,
            theta,
            v0,
            rho,
            xi,
        }
    }

    /// Check the values the discretization needs to stay well-defined.
    ///
    /// `kappa`, `theta` and `xi` only need to be finite: the recurrence is
    /// defined for any real values and the degenerate case `xi = theta = 0`
    /// is a legitimate deterministic model.
    pub fn validate(&self) -> SdeResult<()> {
        validate_finite("kappa", self.kappa)?;
        validate_finite("theta", self.theta)?;
        validate_finite("xi", self.xi)?;
        validate_non_negative("v0", self.v0)?;
        validate_finite("v0", self.v0)?;
        validate_correlation("rho", self.rho)?;
        Ok(())
    }

    /// Feller condition: 2κθ > ξ²
    pub fn feller_condition(&self) -> bool {
        2.0 * self.kappa * self.theta > self.xi * self.xi
    }

    /// Log a warning when the Feller condition fails
    pub fn warn_if_feller_violated(&self) {
        if !self.feller_condition() {
            warn!(
                kappa = self.kappa,
                theta = self.theta,
                xi = self.xi,
                "Feller condition violated (2κθ ≤ ξ²); variance may touch zero"
            );
        }
    }

    pub fn to_array(&self) -> [f64; PARAM_COUNT] {
        [self.kappa, self.theta, self.v0, self.rho, self.xi]
    }

    pub fn from_array(values: [f64; PARAM_COUNT]) -> Self {
        HestonParams::new(values[0], values[1], values[2], values[3], values[4])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }
}

impl From<HestonParams> for DVector<f64> {
    fn from(params: HestonParams) -> Self {
        DVector::from_row_slice(&params.to_array())
    }
}

impl From<&DVector<f64>> for HestonParams {
    fn from(values: &DVector<f64>) -> Self {
        HestonParams::new(values[0], values[1], values[2], values[3], values[4])
    }
}

/// Heston dynamics bound to a drift rate and a variance scheme
#[derive(Clone, Copy, Debug)]
pub struct Heston {
    pub params: HestonParams,
    pub r: f64,
    pub scheme: VarianceScheme,
}

impl Heston {
    pub fn new(params: HestonParams, r: f64) -> SdeResult<Self> {
        Self::new_with_scheme(params, r, VarianceScheme::default())
    }

    pub fn new_with_scheme(params: HestonParams, r: f64, scheme: VarianceScheme) -> SdeResult<Self> {
        params.validate()?;
        validate_finite("r", r)?;
        Ok(Heston { params, r, scheme })
    }

    /// One step of the two-factor recurrence.
    ///
    /// `dw_s` and `dw_v` are Brownian increments already scaled by `√Δt`.
    /// `theta` is passed explicitly so a perturbation hook can move the
    /// long-run level for this step only.
    #[inline]
    pub fn step(&self, s: &mut f64, v: &mut f64, dt: f64, theta: f64, dw_s: f64, dw_v: f64) {
        let sqrt_v = v.sqrt();
        let v_prev = *v;

        *s *= ((self.r - 0.5 * v_prev) * dt + sqrt_v * dw_s).exp();

        let dv = self.params.kappa * (theta - v_prev) * dt + self.params.xi * sqrt_v * dw_v;
        *v = self.scheme.absorb(v_prev + dv);
    }

    pub fn scheme_name(&self) -> &'static str {
        self.scheme.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{correlated_normal_pair, RngFactory};
    use tracing_test::traced_test;

    #[test]
    fn test_default_is_legacy_guess() {
        let p = HestonParams::default();
        assert_eq!(p.to_array(), [1.2, 0.15, 0.5, 0.25, 0.1]);
        assert!(p.feller_condition());
    }

    #[test]
    fn test_vector_conversion_order() {
        let p = HestonParams::new(2.0, 0.04, 0.09, -0.7, 0.3);
        let v: DVector<f64> = p.into();
        assert_eq!(v.len(), PARAM_COUNT);
        assert_eq!(v[0], 2.0);
        assert_eq!(v[3], -0.7);
        assert_eq!(HestonParams::from(&v), p);
    }

    #[test]
    fn test_invalid_parameters() {
        let bad_rho = HestonParams { rho: 1.5, ..Default::default() };
        assert!(Heston::new(bad_rho, 0.05).is_err());

        let bad_v0 = HestonParams { v0: -0.01, ..Default::default() };
        assert!(Heston::new(bad_v0, 0.05).is_err());

        let nan_kappa = HestonParams { kappa: f64::NAN, ..Default::default() };
        assert!(Heston::new(nan_kappa, 0.05).is_err());

        assert!(Heston::new(HestonParams::default(), f64::INFINITY).is_err());
    }

    #[test]
    #[traced_test]
    fn test_feller_violation_logged() {
        HestonParams::default().warn_if_feller_violated();
        assert!(!logs_contain("Feller condition violated"));

        HestonParams::new(1.0, 0.04, 0.04, -0.5, 1.0).warn_if_feller_violated();
        assert!(logs_contain("Feller condition violated"));
    }

    #[test]
    fn test_degenerate_parameters_accepted() {
        let flat = HestonParams::new(3.0, 0.0, 0.0, 0.0, 0.0);
        assert!(Heston::new(flat, 0.05).is_ok());
        assert!(!flat.feller_condition());
    }

    #[test]
    fn test_schemes_keep_state_valid() {
        let params = HestonParams::new(1.0, 0.04, 0.04, -0.5, 1.2);

        for scheme in [VarianceScheme::Reflection, VarianceScheme::FullTruncation] {
            let heston = Heston::new_with_scheme(params, 0.05, scheme).expect("Valid parameters");
            let mut rng = RngFactory::new(42).create_std_rng(0);
            let dt: f64 = 0.01;

            let mut s = 100.0;
            let mut v = params.v0;

            for _ in 0..1_000 {
                let (z_s, z_v) = correlated_normal_pair(&mut rng, params.rho);
                heston.step(&mut s, &mut v, dt, params.theta, z_s * dt.sqrt(), z_v * dt.sqrt());
                assert!(s > 0.0, "Price must remain positive under {}", heston.scheme_name());
                assert!(v >= 0.0, "Variance must be non-negative under {}", heston.scheme_name());
            }
        }
    }

    #[test]
    fn test_reflection_versus_truncation() {
        // A large negative variance shock separates the two schemes
        let params = HestonParams::new(0.0, 0.0, 0.01, 0.0, 1.0);
        let reflect = Heston::new_with_scheme(params, 0.0, VarianceScheme::Reflection).unwrap();
        let truncate = Heston::new_with_scheme(params, 0.0, VarianceScheme::FullTruncation).unwrap();

        let (mut s1, mut v1) = (100.0, 0.01);
        let (mut s2, mut v2) = (100.0, 0.01);
        reflect.step(&mut s1, &mut v1, 0.01, 0.0, 0.0, -0.2);
        truncate.step(&mut s2, &mut v2, 0.01, 0.0, 0.0, -0.2);

        // 0.01 + 1.0 * 0.1 * (-0.2) = -0.01
        assert!((v1 - 0.01).abs() < 1e-15);
        assert_eq!(v2, 0.0);
        assert_eq!(s1, s2);
    }
}
