// demos/incident_projection.rs
use chrono::{Duration, NaiveDate};
use spill_sde::calibration::PricePoint;
use spill_sde::incident::{analyse_incident, IncidentConfig, PriceSeries};
use spill_sde::models::heston::HestonParams;
use spill_sde::models::perturbation::IncidentShock;
use spill_sde::output;
use spill_sde::{simulate, SimulationRequest};

fn main() {
    println!("Incident Price-Impact Projection");
    println!("================================\n");

    // Stand-in for a daily crude price history: 90 days from one seeded path
    let start = NaiveDate::from_ymd_opt(2012, 2, 1).expect("Valid date");
    let history = simulate(&SimulationRequest {
        s0: 56.0,
        t: 3.0 / 12.0,
        r: 0.5,
        params: HestonParams::new(1.2, 0.1, 0.12, -0.2, 0.3),
        days: 90,
        seed: Some(1989),
        ..Default::default()
    })
    .expect("Valid request");
    let points = history
        .first_path()
        .into_iter()
        .enumerate()
        .map(|(i, price)| PricePoint::new(start + Duration::days(i as i64), price))
        .collect();
    let series = PriceSeries::new(points).expect("Valid series");

    let incident = start + Duration::days(45);
    for (label, shock) in [("baseline", None), ("shocked", Some(IncidentShock::default()))] {
        let cfg = IncidentConfig {
            seed: Some(20),
            projection_paths: 500,
            shock,
            ..IncidentConfig::new(incident)
        };

        let report = match analyse_incident(&series, &cfg) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{} analysis failed: {}", label, e);
                continue;
            }
        };

        println!("[{}] incident {} at {:.2}", label, report.windows.incident.date, report.windows.incident.value);
        println!(
            "  calibration: {} days, SSE {:.4}, converged {}",
            report.windows.calibration.len(),
            report.calibration.sse,
            report.calibration.converged
        );
        println!("  fitted: {:?}", report.calibration.params);
        println!(
            "  projected peak {:.2} on {} ({} days after)",
            report.projected_peak.value,
            report.projected_peak.date,
            report.projected_peak_offset()
        );
        println!("  observed peak  {:.2} on {}", report.observed_peak.value, report.observed_peak.date);
        println!("  spike within 30 days: {}\n", report.spike_within(30));

        let filename = format!("incident_{}.csv", label);
        if let Err(e) = output::write_paths_to_csv(&filename, &report.projection) {
            eprintln!("  Could not write {}: {}", filename, e);
        }
    }
}
