//! ap-core: shared foundation for aeropost.
//!
//! Contains:
//! - numeric (tolerances + float helpers)
//! - ids (compact 1-based case identifiers)
//! - error (shared error taxonomy)

pub mod error;
pub mod ids;
pub mod numeric;

pub use error::{ApError, ApResult, ErrorKind};
pub use ids::CaseId;
pub use numeric::*;
