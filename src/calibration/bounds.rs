// src/calibration/bounds.rs
//! Optional box constraints on the calibrated parameters.
//!
//! Calibration is unconstrained unless bounds are supplied. With bounds, each
//! trial is projected onto the box before it is simulated, so the solver's
//! iterate may sit outside the box while every evaluated model lies inside it.

use crate::error::{SdeError, SdeResult};
use crate::models::heston::{HestonParams, PARAM_COUNT, PARAM_NAMES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub lower: HestonParams,
    pub upper: HestonParams,
}

impl ParameterBounds {
    pub fn new(lower: HestonParams, upper: HestonParams) -> SdeResult<Self> {
        let bounds = ParameterBounds { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Ranges commonly used for daily commodity prices:
    /// κ ∈ [0.1, 2], θ ∈ [0.05, 0.3], v0 ∈ [0, 1], ρ ∈ [-0.9, 0.9], ξ ∈ [0.1, 1]
    pub fn conventional() -> Self {
        ParameterBounds {
            lower: HestonParams::new(0.1, 0.05, 0.0, -0.9, 0.1),
            upper: HestonParams::new(2.0, 0.3, 1.0, 0.9, 1.0),
        }
    }

    pub fn validate(&self) -> SdeResult<()> {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();

        for i in 0..PARAM_COUNT {
            if lo[i].is_nan() || hi[i].is_nan() || lo[i] > hi[i] {
                return Err(SdeError::InvalidParameters {
                    parameter: PARAM_NAMES[i].to_string(),
                    value: lo[i],
                    constraint: format!("lower bound must not exceed upper bound {}", hi[i]),
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, params: &HestonParams) -> bool {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        params
            .to_array()
            .iter()
            .enumerate()
            .all(|(i, x)| *x >= lo[i] && *x <= hi[i])
    }

    /// Clamp every parameter into its interval
    pub fn project(&self, params: &HestonParams) -> HestonParams {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        let mut values = params.to_array();
        for i in 0..PARAM_COUNT {
            values[i] = values[i].clamp(lo[i], hi[i]);
        }
        HestonParams::from_array(values)
    }
}
