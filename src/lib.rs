//! # spill-sde: Heston Calibration and Path Simulation for Price-Impact Studies
//!
//! Fits a Heston stochastic volatility model to a window of observed prices and
//! simulates forward paths with the fitted parameters, e.g. to estimate how an
//! incident such as an oil spill could have moved a commodity price.
//!
//! ## Components
//!
//! - **Path simulation** ([`mc::simulator`]): log-Euler price / reflected
//!   Euler variance discretization, seeded per-path streams, rayon-parallel
//! - **Calibration** ([`calibration`]): Levenberg-Marquardt least squares on
//!   simulated-minus-observed residuals with common random numbers
//! - **Incident analysis** ([`incident`]): window slicing around an event date,
//!   calibration, forward projection and peak detection
//! - **Analytics and output**: path envelopes and CSV export
//!
//! ## Quick Start
//!
//! ```rust
//! use spill_sde::mc::simulator::{simulate, SimulationRequest};
//! use spill_sde::models::heston::HestonParams;
//!
//! let request = SimulationRequest {
//!     s0: 56.0,
//!     t: 2.0 / 12.0,
//!     r: 1.0,
//!     params: HestonParams::default(),
//!     days: 60,
//!     n_paths: 1,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let paths = simulate(&request).expect("Valid request");
//! assert_eq!(paths.prices.dim(), (1, 60));
//! ```
//!
//! Nothing runs at load time; every computation is an explicit call.

pub mod analytics;
pub mod calibration;
pub mod error;
pub mod incident;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod output;
pub mod rng;

pub use calibration::{calibrate, CalibrationConfig, CalibrationResult, ObservedWindow};
pub use error::{ErrorKind, SdeError, SdeResult};
pub use mc::simulator::{simulate, simulate_with_perturbation, PathResult, SimulationRequest};
pub use models::heston::{HestonParams, VarianceScheme};
