//! Linear post-processing of aeroelastic cases.
//!
//! This crate turns velocity sweeps of eigenvalues into damping/frequency
//! curves and flutter speeds, wraps frequency responses and state-space
//! models, and propagates input spectra through a frequency response to
//! output covariance and correlation.

pub mod error;
pub mod stability;
pub mod statespace;
pub mod statistics;

pub use error::{LinearError, LinearResult};
pub use stability::{
    FilteredModes, ModeFilter, Stability, StabilityAnalysis, filter_samples, find_flutter_speed,
    flutter_report, max_mode, modes,
};
pub use statespace::{Bode, BodeQuantity, StateSpace};
pub use statistics::{FrequencyResponseStatistics, joint_gaussian_probability};
