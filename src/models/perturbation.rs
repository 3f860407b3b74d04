// src/models/perturbation.rs
//! Day-dependent perturbations of the long-run variance level.
//!
//! The base recurrence uses a constant θ. A [`ThetaPerturbation`] scales θ on
//! chosen days, which is how an event such as a supply shock is layered on top
//! of a calibrated model without touching the recurrence itself.

use crate::error::{SdeError, SdeResult};

/// Multiplier applied to θ on a given simulation day (0-based).
pub trait ThetaPerturbation: Sync {
    fn theta_multiplier(&self, day: usize) -> f64;
}

impl<F> ThetaPerturbation for F
where
    F: Fn(usize) -> f64 + Sync,
{
    fn theta_multiplier(&self, day: usize) -> f64 {
        self(day)
    }
}

/// Constant θ
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPerturbation;

impl ThetaPerturbation for NoPerturbation {
    #[inline]
    fn theta_multiplier(&self, _day: usize) -> f64 {
        1.0
    }
}

/// Step-up of θ after a trigger day, decaying geometrically back to 1.
///
/// ```text
/// m(day) = 1                                      day ≤ trigger
/// m(day) = 1 + (multiplier - 1) · decay^(day - trigger - 1)   otherwise
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentShock {
    pub trigger_day: usize,
    pub multiplier: f64,
    pub decay: f64,
}

impl Default for IncidentShock {
    fn default() -> Self {
        IncidentShock {
            trigger_day: 20,
            multiplier: 1.5,
            decay: 0.8,
        }
    }
}

impl IncidentShock {
    pub fn new(trigger_day: usize, multiplier: f64, decay: f64) -> SdeResult<Self> {
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(SdeError::InvalidParameters {
                parameter: "multiplier".to_string(),
                value: multiplier,
                constraint: "must be finite and non-negative".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&decay) {
            return Err(SdeError::InvalidParameters {
                parameter: "decay".to_string(),
                value: decay,
                constraint: "must be in range [0, 1]".to_string(),
            });
        }
        Ok(IncidentShock {
            trigger_day,
            multiplier,
            decay,
        })
    }
}

impl ThetaPerturbation for IncidentShock {
    fn theta_multiplier(&self, day: usize) -> f64 {
        if day <= self.trigger_day {
            return 1.0;
        }
        let elapsed = (day - self.trigger_day - 1) as i32;
        1.0 + (self.multiplier - 1.0) * self.decay.powi(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_perturbation_is_identity() {
        assert!((0..100).all(|d| NoPerturbation.theta_multiplier(d) == 1.0));
    }

    #[test]
    fn test_closure_hook() {
        let hook = |day: usize| if day >= 10 { 2.0 } else { 1.0 };
        assert_eq!(hook.theta_multiplier(9), 1.0);
        assert_eq!(hook.theta_multiplier(10), 2.0);
    }

    #[test]
    fn test_incident_shock_profile() {
        let shock = IncidentShock::default();

        assert_eq!(shock.theta_multiplier(0), 1.0);
        assert_eq!(shock.theta_multiplier(20), 1.0);
        assert!((shock.theta_multiplier(21) - 1.5).abs() < 1e-12);
        assert!((shock.theta_multiplier(22) - 1.4).abs() < 1e-12);

        let late = shock.theta_multiplier(200);
        assert!(late >= 1.0 && late - 1.0 < 1e-12);
    }

    #[test]
    fn test_incident_shock_validation() {
        assert!(IncidentShock::new(5, 2.0, 0.5).is_ok());
        assert!(IncidentShock::new(5, -1.0, 0.5).is_err());
        assert!(IncidentShock::new(5, f64::NAN, 0.5).is_err());
        assert!(IncidentShock::new(5, 2.0, 1.5).is_err());
    }
}
