// demos/simulate_paths.rs
use spill_sde::analytics::path_stats::PathStatistics;
use spill_sde::math_utils::Timer;
use spill_sde::models::heston::{HestonParams, VarianceScheme};
use spill_sde::models::perturbation::IncidentShock;
use spill_sde::output;
use spill_sde::{simulate, simulate_with_perturbation, SimulationRequest};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let n_paths = args
        .get(1)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000);

    println!("Heston Path Simulation Demo");
    println!("===========================\n");

    // Two months of daily steps from the legacy starting guess
    let base = SimulationRequest {
        s0: 56.0,
        t: 2.0 / 12.0,
        r: 1.0,
        params: HestonParams::default(),
        days: 60,
        n_paths,
        return_variance: true,
        seed: Some(42),
        scheme: VarianceScheme::Reflection,
    };

    let mut timer = Timer::new();
    timer.start();
    let paths = simulate(&base).expect("Valid request");
    let elapsed = timer.elapsed_ms();

    let stats = PathStatistics::from_paths(&paths.prices);
    println!("Paths: {}  Days: {}  Seed: {}", paths.n_paths(), paths.days(), paths.seed);
    println!("Elapsed: {:.2} ms ({:.0} paths/sec)", elapsed, n_paths as f64 / (elapsed / 1000.0));
    println!(
        "Terminal price: mean {:.4}, std dev {:.4}, range [{:.4}, {:.4}]",
        stats.terminal_mean(),
        stats.terminal_std_dev(),
        stats.min[stats.days() - 1],
        stats.max[stats.days() - 1]
    );
    println!("Analytic E[S_T]: {:.4}\n", base.s0 * (base.r * base.t).exp());

    // Same seed, θ shocked from day 20
    let shocked = simulate_with_perturbation(&base, &IncidentShock::default()).expect("Valid request");
    let shocked_stats = PathStatistics::from_paths(shocked.variances.as_ref().expect("Variance requested"));
    let plain_stats = PathStatistics::from_paths(paths.variances.as_ref().expect("Variance requested"));
    println!("Mean variance by day (plain vs shocked θ):");
    for day in (0..base.days).step_by(10) {
        println!(
            "  day {:>2}: {:.5}  {:.5}",
            day, plain_stats.mean[day], shocked_stats.mean[day]
        );
    }

    // A handful of paths is enough for plotting
    let sample = simulate(&SimulationRequest { n_paths: 5, ..base.clone() }).expect("Valid request");
    let filename = "heston_paths.csv";
    match output::write_paths_to_csv(filename, &sample) {
        Ok(()) => println!("\nSample paths written to {}", filename),
        Err(e) => eprintln!("\nCould not write {}: {}", filename, e),
    }

    println!("\nInvalid input is reported, not panicked on:");
    let bad = SimulationRequest {
        params: HestonParams { rho: 1.5, ..Default::default() },
        ..base
    };
    match simulate(&bad) {
        Ok(_) => println!("  Unexpected: should have failed"),
        Err(e) => println!("  Caught error: {}", e),
    }
}
