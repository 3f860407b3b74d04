// src/incident.rs
//! Incident impact analysis
//!
//! Given a daily price series and the date of an incident (e.g. a reported
//! spill), the analysis
//! 1. takes the `lookback` samples before the incident as calibration window
//! 2. takes the incident sample and the following samples as comparison window
//! 3. fits Heston parameters to the calibration window
//! 4. projects forward from the incident price with the fitted parameters on
//!    fresh random streams, optionally with an [`IncidentShock`] on θ
//! 5. reports where the projected and observed peaks fall
//!
//! Column `k` of the projection is aligned with sample `k` of the comparison
//! window.

use crate::analytics::path_stats::PathStatistics;
use crate::calibration::{calibrate, CalibrationConfig, CalibrationResult, ObservedWindow, PricePoint};
use crate::error::{validation::*, SdeError, SdeResult};
use crate::math_utils::argmax;
use crate::mc::simulator::{simulate, simulate_with_perturbation, PathResult, SimulationRequest};
use crate::models::heston::{HestonParams, VarianceScheme};
use crate::models::perturbation::IncidentShock;
use crate::rng;
use chrono::NaiveDate;
use tracing::info;

/// Date-ordered price history
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sort by date; duplicate dates and invalid prices are rejected
    pub fn new(mut points: Vec<PricePoint>) -> SdeResult<Self> {
        points.sort_by_key(|p| p.date);
        ObservedWindow::new(points.clone())?;
        Ok(PriceSeries { points })
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

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.points.binary_search_by_key(&date, |p| p.date).ok()
    }

    /// Slice the windows around `incident`.
    ///
    /// The calibration window holds up to `lookback` samples strictly before
    /// the incident; the comparison window starts at the incident sample and
    /// holds up to `horizon` samples.
    pub fn split_at_incident(
        &self,
        incident: NaiveDate,
        lookback: usize,
        horizon: usize,
    ) -> SdeResult<IncidentWindows> {
        validate_count("lookback", lookback, 1)?;
        validate_count("horizon", horizon, 1)?;

        let idx = self.position(incident).ok_or_else(|| SdeError::InvalidConfiguration {
            field: "incident date".to_string(),
            reason: format!("{} is not in the price series", incident),
        })?;

        if idx == 0 {
            return Err(SdeError::InvalidConfiguration {
                field: "incident date".to_string(),
                reason: format!("no observations before {}", incident),
            });
        }

        let start = idx.saturating_sub(lookback);
        let end = (idx + horizon).min(self.points.len());

        Ok(IncidentWindows {
            calibration: ObservedWindow::new(self.points[start..idx].to_vec())?,
            comparison: ObservedWindow::new(self.points[idx..end].to_vec())?,
            incident: self.points[idx],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentWindows {
    pub calibration: ObservedWindow,
    pub comparison: ObservedWindow,
    pub incident: PricePoint,
}

/// Stream family of the forward projection, kept apart from the
/// calibration streams so the projection does not replay the fitted noise
const PROJECTION_STREAMS: u64 = 1;

#[derive(Debug, Clone)]
pub struct IncidentConfig {
    pub incident: NaiveDate,
    pub lookback: usize,
    pub horizon: usize,
    /// Years spanned by a full `lookback` window
    pub t: f64,
    pub r: f64,
    pub initial_guess: HestonParams,
    /// Seed of the calibration run
    pub seed: Option<u64>,
    /// Seed of the projection; derived from the calibration seed when `None`
    pub projection_seed: Option<u64>,
    pub patience: usize,
    pub projection_paths: usize,
    pub scheme: VarianceScheme,
    pub shock: Option<IncidentShock>,
}

impl IncidentConfig {
    pub fn new(incident: NaiveDate) -> Self {
        IncidentConfig {
            incident,
            lookback: 30,
            horizon: 30,
            t: 1.0 / 12.0,
            r: 1.0,
            initial_guess: HestonParams::default(),
            seed: None,
            projection_seed: None,
            patience: 100,
            projection_paths: 1,
            scheme: VarianceScheme::default(),
            shock: None,
        }
    }

    pub fn validate(&self) -> SdeResult<()> {
        validate_count("lookback", self.lookback, 1)?;
        validate_count("horizon", self.horizon, 1)?;
        validate_positive("t", self.t)?;
        validate_finite("t", self.t)?;
        validate_finite("r", self.r)?;
        validate_count("patience", self.patience, 1)?;
        validate_count("projection_paths", self.projection_paths, 1)?;
        Ok(())
    }

    fn years_per_day(&self) -> f64 {
        self.t / self.lookback as f64
    }
}

#[derive(Debug, Clone)]
pub struct IncidentReport {
    pub windows: IncidentWindows,
    pub calibration: CalibrationResult,
    pub projection: PathResult,
    pub envelope: PathStatistics,
    /// Highest point of the mean projected path
    pub projected_peak: PricePoint,
    pub observed_peak: PricePoint,
}

impl IncidentReport {
    /// Days from the incident to the projected peak
    pub fn projected_peak_offset(&self) -> i64 {
        (self.projected_peak.date - self.windows.incident.date).num_days()
    }

    /// Whether the projected peak falls within `days` calendar days of the incident
    pub fn spike_within(&self, days: i64) -> bool {
        self.projected_peak_offset() <= days
    }
}

/// Calibrate before the incident and project past it
pub fn analyse_incident(series: &PriceSeries, cfg: &IncidentConfig) -> SdeResult<IncidentReport> {
    cfg.validate()?;
    let windows = series.split_at_incident(cfg.incident, cfg.lookback, cfg.horizon)?;

    let calibration_days = windows.calibration.len();
    let calibration_config = CalibrationConfig {
        s0: windows.calibration.first().value,
        t: cfg.years_per_day() * calibration_days as f64,
        r: cfg.r,
        days: calibration_days,
        n_paths: 1,
        seed: cfg.seed,
        scheme: cfg.scheme,
        patience: cfg.patience,
        ..Default::default()
    };
    let calibration = calibrate(&calibration_config, &windows.calibration, cfg.initial_guess)?;

    let projection_days = windows.comparison.len();
    let request = SimulationRequest {
        s0: windows.incident.value,
        t: cfg.years_per_day() * projection_days as f64,
        r: cfg.r,
        params: calibration.params,
        days: projection_days,
        n_paths: cfg.projection_paths,
        return_variance: true,
        seed: Some(
            cfg.projection_seed
                .unwrap_or_else(|| rng::derive_seed(calibration.seed, PROJECTION_STREAMS)),
        ),
        scheme: cfg.scheme,
    };
    let projection = match &cfg.shock {
        Some(shock) => simulate_with_perturbation(&request, shock)?,
        None => simulate(&request)?,
    };

    let envelope = PathStatistics::from_paths(&projection.prices);
    let comparison = windows.comparison.points();

    let peak_idx = argmax(&envelope.mean).ok_or_else(|| SdeError::NumericalInstability {
        method: "incident projection".to_string(),
        reason: "projected mean path has no finite values".to_string(),
    })?;
    let projected_peak = PricePoint::new(comparison[peak_idx].date, envelope.mean[peak_idx]);

    let observed_idx = argmax(&windows.comparison.prices()).unwrap_or(0);
    let observed_peak = comparison[observed_idx];

    info!(
        incident = %windows.incident.date,
        projected_peak = %projected_peak.date,
        observed_peak = %observed_peak.date,
        converged = calibration.converged,
        "incident analysis finished"
    );

    Ok(IncidentReport {
        windows,
        calibration,
        projection,
        envelope,
        projected_peak,
        observed_peak,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2012, 4, 1).unwrap();
        let points = (0..n)
            .map(|i| {
                PricePoint::new(
                    start + Duration::days(i as i64),
                    80.0 + 2.0 * (i as f64 * 0.3).sin(),
                )
            })
            .collect();
        PriceSeries::new(points).unwrap()
    }

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 4, 1).unwrap() + Duration::days(offset)
    }

    #[test]
    fn test_series_sorted_on_construction() {
        let points = vec![
            PricePoint::new(date(2), 81.0),
            PricePoint::new(date(0), 80.0),
            PricePoint::new(date(1), 80.5),
        ];
        let s = PriceSeries::new(points).unwrap();
        assert_eq!(s.points()[0].date, date(0));
        assert_eq!(s.position(date(2)), Some(2));
    }

    #[test]
    fn test_split_full_windows() {
        let s = series(90);
        let w = s.split_at_incident(date(40), 30, 30).unwrap();

        assert_eq!(w.calibration.len(), 30);
        assert_eq!(w.calibration.first().date, date(10));
        assert_eq!(w.calibration.last().date, date(39));
        assert_eq!(w.comparison.len(), 30);
        assert_eq!(w.comparison.first().date, date(40));
        assert_eq!(w.incident.date, date(40));
    }

    #[test]
    fn test_split_truncates_at_series_edges() {
        let s = series(50);
        let w = s.split_at_incident(date(10), 30, 60).unwrap();
        assert_eq!(w.calibration.len(), 10);
        assert_eq!(w.comparison.len(), 40);
    }

    #[test]
    fn test_split_errors() {
        let s = series(50);
        assert!(s.split_at_incident(date(0), 30, 30).is_err());
        assert!(s.split_at_incident(date(100), 30, 30).is_err());
        assert!(s.split_at_incident(date(10), 0, 30).is_err());
    }

    #[test]
    fn test_analysis_aligns_projection_with_comparison_window() {
        let s = series(80);
        let cfg = IncidentConfig {
            seed: Some(12),
            patience: 5,
            projection_paths: 8,
            r: 0.05,
            shock: Some(IncidentShock::new(5, 1.5, 0.8).unwrap()),
            ..IncidentConfig::new(date(40))
        };

        let report = analyse_incident(&s, &cfg).unwrap();
        assert_eq!(report.projection.prices.dim(), (8, 30));
        assert_eq!(report.envelope.days(), 30);
        assert!(report.projected_peak_offset() >= 0 && report.projected_peak_offset() < 30);
        assert!(report.spike_within(30));
        assert!(report.windows.comparison.dates().contains(&report.observed_peak.date));
    }

    #[test]
    fn test_projection_draws_fresh_noise() {
        let s = series(80);
        let cfg = IncidentConfig {
            seed: Some(12),
            patience: 5,
            ..IncidentConfig::new(date(40))
        };

        let report = analyse_incident(&s, &cfg).unwrap();
        assert_ne!(report.projection.seed, report.calibration.seed);

        // Fitted pre-incident path, normalised by its starting price
        let s0_calibration = report.windows.calibration.first().value;
        let fitted: Vec<f64> = report
            .calibration
            .residuals
            .iter()
            .zip(report.windows.calibration.prices())
            .map(|(r, o)| (r + o) / s0_calibration)
            .collect();

        let s_incident = report.windows.incident.value;
        let projected: Vec<f64> = report.projection.path(0).iter().map(|p| p / s_incident).collect();

        let max_gap = fitted
            .iter()
            .zip(&projected)
            .map(|(f, p)| (f - p).abs() / f)
            .fold(0.0, f64::max);
        assert!(max_gap > 1e-6, "projection replays the calibration noise (gap {})", max_gap);
    }

    #[test]
    fn test_explicit_projection_seed_is_used() {
        let s = series(80);
        let cfg = IncidentConfig {
            seed: Some(12),
            projection_seed: Some(777),
            patience: 5,
            ..IncidentConfig::new(date(40))
        };

        let report = analyse_incident(&s, &cfg).unwrap();
        assert_eq!(report.projection.seed, 777);
        assert_eq!(report.calibration.seed, 12);
    }
}
