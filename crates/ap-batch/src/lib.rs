//! ap-batch: parameterised collections of aeroelastic cases.
//!
//! A dataset builder ([`Actual`] for a directory tree of simulation outputs,
//! [`Interpolated`] for a precomputed interpolation summary) reads one
//! manifest per parameter point, creates one [`Case`] per physical system,
//! loads the requested artifacts and files each case into that system's
//! [`SetOfCases`]. Aggregate queries over a built dataset live on the
//! [`Dataset`] trait.

pub mod actual;
pub mod case;
pub mod config;
pub mod dataset;
pub mod deflection;
pub mod error;
pub mod interpolated;
pub mod parameter;
pub mod progress;
pub mod set;
pub mod system;

pub use actual::Actual;
pub use case::{Case, LoadOutcome};
pub use config::{AnalysisConfig, BulkLoadOptions, PathRewrite, load_yaml, save_yaml};
pub use dataset::{
    DampingFilter, DampingPoint, Dataset, EigsSweep, Frame, SystemSets, VectorSweep,
};
pub use error::{BatchError, BatchResult};
pub use interpolated::Interpolated;
pub use parameter::{ManifestParameters, ParamDict, ParameterMode, ParameterValue};
pub use progress::{BulkLoadEvent, BulkLoadStage};
pub use set::SetOfCases;
pub use system::{ArtifactKind, EigsNaming, PathLayout, System};
