// scripts/benchmark.rs
use chrono::NaiveDate;
use spill_sde::analytics::path_stats::PathStatistics;
use spill_sde::math_utils::Timer;
use spill_sde::models::heston::{HestonParams, VarianceScheme};
use spill_sde::{calibrate, simulate, CalibrationConfig, ObservedWindow, SimulationRequest};
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    rustc_flags: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::cpu_model(),
            cpu_cores: num_cpus::get(),
            rustc_flags: env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn cpu_model() -> String {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|line| line.starts_with("model name"))
                    .and_then(|line| line.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
            .unwrap_or_else(|| "Unknown CPU".to_string())
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    name: String,
    paths: usize,
    time_ms: f64,
    throughput_paths_per_sec: f64,
    value: f64,
    reference_value: Option<f64>,
}

impl BenchmarkResult {
    fn relative_error(&self) -> Option<f64> {
        self.reference_value.map(|r| (self.value - r).abs() / r.abs())
    }
}

fn run_simulation_benchmarks() -> Vec<BenchmarkResult> {
    let mut results = Vec::new();

    for scheme in [VarianceScheme::Reflection, VarianceScheme::FullTruncation] {
        for &paths in &[10_000, 100_000, 1_000_000] {
            println!("Simulating {} paths ({})...", paths, scheme.name());

            let req = SimulationRequest {
                s0: 56.0,
                t: 2.0 / 12.0,
                r: 1.0,
                params: HestonParams::default(),
                days: 60,
                n_paths: paths,
                seed: Some(42),
                scheme,
                ..Default::default()
            };

            let mut timer = Timer::new();
            timer.start();
            let result = match simulate(&req) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("  skipped: {}", e);
                    continue;
                }
            };
            let time_ms = timer.elapsed_ms();

            // E[S_T] = S0·exp(rT) for the log-Euler price step
            let stats = PathStatistics::from_paths(&result.prices);
            results.push(BenchmarkResult {
                name: format!("{} terminal mean ({}k paths)", scheme.name(), paths / 1000),
                paths,
                time_ms,
                throughput_paths_per_sec: paths as f64 / (time_ms / 1000.0),
                value: stats.terminal_mean(),
                reference_value: Some(req.s0 * (req.r * req.t).exp()),
            });
        }
    }

    results
}

fn run_calibration_benchmarks() -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    let truth = HestonParams::new(1.2, 0.15, 0.5, 0.25, 0.3);
    let start = NaiveDate::from_ymd_opt(2012, 3, 1).expect("Valid date");

    for &days in &[30, 60, 120] {
        println!("Calibrating against a {}-day window...", days);

        let cfg = CalibrationConfig {
            t: days as f64 / 360.0,
            days,
            seed: Some(2024),
            patience: 200,
            ..Default::default()
        };
        let observed = simulate(&SimulationRequest {
            s0: cfg.s0,
            t: cfg.t,
            r: cfg.r,
            params: truth,
            days,
            seed: cfg.seed,
            ..Default::default()
        })
        .map(|paths| paths.first_path())
        .and_then(|prices| ObservedWindow::from_daily(start, &prices));
        let window = match observed {
            Ok(window) => window,
            Err(e) => {
                eprintln!("  skipped: {}", e);
                continue;
            }
        };

        let mut timer = Timer::new();
        timer.start();
        let fit = match calibrate(&cfg, &window, HestonParams::default()) {
            Ok(fit) => fit,
            Err(e) => {
                eprintln!("  skipped: {}", e);
                continue;
            }
        };
        let time_ms = timer.elapsed_ms();

        results.push(BenchmarkResult {
            name: format!("Calibration RMSE ({} days, {} evals)", days, fit.evaluations),
            paths: fit.evaluations,
            time_ms,
            throughput_paths_per_sec: fit.evaluations as f64 / (time_ms / 1000.0),
            value: fit.rmse(),
            reference_value: None,
        });
    }

    results
}

fn write_results_to_csv(results: &[BenchmarkResult], system_info: &SystemInfo, filename: &str) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);

    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU: {}", system_info.cpu_model)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# RUSTFLAGS: {}", system_info.rustc_flags)?;
    writeln!(file, "# Rayon Threads: {}", system_info.rayon_threads)?;
    writeln!(file, "# Benchmark Date: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;

    writeln!(file, "Benchmark,Paths,Time_ms,Throughput_per_sec,Value,Reference_Value,Relative_Error")?;
    for result in results {
        writeln!(
            file,
            "{},{},{:.2},{:.0},{:.6},{},{}",
            result.name,
            result.paths,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.value,
            result
                .reference_value
                .map(|v| format!("{:.6}", v))
                .unwrap_or_else(|| "N/A".to_string()),
            result
                .relative_error()
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "N/A".to_string())
        )?;
    }

    file.flush()
}

fn main() {
    println!("spill-sde Benchmark Suite");
    println!("=========================\n");

    let system_info = SystemInfo::gather();
    println!("  OS: {}", system_info.os);
    println!("  CPU: {}", system_info.cpu_model);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let mut results = run_simulation_benchmarks();
    results.extend(run_calibration_benchmarks());

    println!("\n{:<55} {:>10} {:>14} {:>12}", "Benchmark", "Time (ms)", "Per second", "Value");
    for result in &results {
        println!(
            "{:<55} {:>10.2} {:>14.0} {:>12.6}",
            result.name, result.time_ms, result.throughput_paths_per_sec, result.value
        );
    }

    let filename = "benchmark_results.csv";
    match write_results_to_csv(&results, &system_info, filename) {
        Ok(()) => println!("\nResults written to {}", filename),
        Err(e) => eprintln!("\nCould not write {}: {}", filename, e),
    }
}
