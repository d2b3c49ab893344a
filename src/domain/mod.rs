//! Domain models for the civic complaint desk
//!
//! Complaint lifecycle, priority and duplicate screening, ward geometry,
//! SLA-based officer scoring and municipal bills.

mod account;
mod bill;
mod complaint;
mod geo;
mod scoring;
mod similarity;
mod types;

pub use account::*;
pub use bill::*;
pub use complaint::*;
pub use geo::*;
pub use scoring::*;
pub use similarity::*;
pub use types::*;
