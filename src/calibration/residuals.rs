// src/calibration/residuals.rs
//! Residual helpers shared by the calibrator.

use crate::error::{validation::*, SdeError, SdeResult};

/// Residual assigned to every sample when a trial leaves the simulator's
/// domain. Large enough that the solver always rejects the step.
pub const INVALID_TRIAL_PENALTY: f64 = 1e6;

/// Elementwise `simulated - observed`.
///
/// Both series must have the same length; nothing is truncated or padded.
pub fn residuals(simulated: &[f64], observed: &[f64]) -> SdeResult<Vec<f64>> {
    validate_same_length("residual computation", observed.len(), simulated.len())?;

    let out: Vec<f64> = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| s - o)
        .collect();

    if let Some(idx) = out.iter().position(|x| !x.is_finite()) {
        return Err(SdeError::NumericalInstability {
            method: "residual computation".to_string(),
            reason: format!("residual {} is not finite ({})", idx, out[idx]),
        });
    }

    Ok(out)
}

pub fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|x| x * x).sum()
}

/// Residual vector used for trials the simulator refuses
pub fn penalty_residuals(len: usize) -> Vec<f64> {
    vec![INVALID_TRIAL_PENALTY; len]
}

/// Forward-difference step for a parameter value
pub fn finite_difference_step(x: f64) -> f64 {
    f64::EPSILON.sqrt() * x.abs().max(1.0)
}
