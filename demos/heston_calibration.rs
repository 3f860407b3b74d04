// demos/heston_calibration.rs
use chrono::NaiveDate;
use spill_sde::calibration::ParameterBounds;
use spill_sde::math_utils::Timer;
use spill_sde::models::heston::{HestonParams, PARAM_NAMES};
use spill_sde::output;
use spill_sde::{calibrate, simulate, CalibrationConfig, ObservedWindow, SimulationRequest};

fn main() {
    println!("Heston Calibration Demo");
    println!("=======================\n");

    let truth = HestonParams::new(1.5, 0.12, 0.4, -0.3, 0.35);
    let cfg = CalibrationConfig {
        s0: 56.0,
        t: 1.0 / 12.0,
        r: 1.0,
        days: 30,
        seed: Some(7),
        patience: 200,
        ..Default::default()
    };

    // A window generated by known parameters, so the fit can be checked
    let synthetic = simulate(&SimulationRequest {
        s0: cfg.s0,
        t: cfg.t,
        r: cfg.r,
        params: truth,
        days: cfg.days,
        seed: cfg.seed,
        ..Default::default()
    })
    .expect("Valid request");
    let start = NaiveDate::from_ymd_opt(2012, 3, 1).expect("Valid date");
    let window = ObservedWindow::from_daily(start, &synthetic.first_path()).expect("Valid window");

    println!("True parameters: {:?}\n", truth);

    for (label, config) in [
        ("unconstrained", cfg.clone()),
        (
            "bounded",
            CalibrationConfig {
                bounds: Some(ParameterBounds::conventional()),
                ..cfg.clone()
            },
        ),
    ] {
        let mut timer = Timer::new();
        timer.start();
        let result = match calibrate(&config, &window, HestonParams::default()) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("{} calibration failed: {}", label, e);
                continue;
            }
        };

        println!("{} fit ({:.1} ms, {} evaluations, {:?}):", label, timer.elapsed_ms(), result.evaluations, result.termination);
        for (name, (fitted, actual)) in PARAM_NAMES.iter().zip(result.params.to_array().iter().zip(truth.to_array())) {
            println!("  {:<6} {:>9.5}  (true {:>8.5})", name, fitted, actual);
        }
        println!("  SSE {:.3e}, RMSE {:.3e}", result.sse, result.rmse());
        println!("  Feller condition: {}\n", result.params.feller_condition());

        let filename = format!("calibration_{}.csv", label);
        if let Err(e) = output::write_calibration_summary(&filename, &result) {
            eprintln!("  Could not write {}: {}", filename, e);
        }
    }
}
