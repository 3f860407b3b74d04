pub mod bounds;
pub mod calibrator;
pub mod residuals;
pub mod window;

pub use bounds::ParameterBounds;
pub use calibrator::{calibrate, CalibrationConfig, CalibrationResult, HestonCalibrator, Termination};
pub use window::{ObservedWindow, PricePoint};
