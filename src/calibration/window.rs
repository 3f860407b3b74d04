// src/calibration/window.rs
//! Observed price windows used as calibration targets.

use crate::error::{validation::*, SdeError, SdeResult};
use chrono::{Duration, NaiveDate};

/// One dated price observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        PricePoint { date, value }
    }
}

/// Time-ordered, read-only slice of a price series.
///
/// Dates are strictly increasing and every price is finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedWindow {
    points: Vec<PricePoint>,
}

impl ObservedWindow {
    pub fn new(points: Vec<PricePoint>) -> SdeResult<Self> {
        validate_count("observed window", points.len(), 1)?;

        for point in &points {
            validate_finite("observed price", point.value)?;
            validate_positive("observed price", point.value)?;
        }

        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(SdeError::InvalidConfiguration {
                field: "observed window".to_string(),
                reason: format!(
                    "dates must be strictly increasing ({} followed by {})",
                    pair[0].date, pair[1].date
                ),
            });
        }

        Ok(ObservedWindow { points })
    }

    /// Window of consecutive calendar days starting at `start`
    pub fn from_daily(start: NaiveDate, values: &[f64]) -> SdeResult<Self> {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| PricePoint::new(start + Duration::days(i as i64), value))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first(&self) -> PricePoint {
        self.points[0]
    }

    pub fn last(&self) -> PricePoint {
        self.points[self.points.len() - 1]
    }
}
