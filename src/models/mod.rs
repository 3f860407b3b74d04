pub mod heston;
pub mod perturbation;
