//! Experiment lifecycle engine for labrec
//!
//! This crate provides:
//! - Directory allocation under the experiments root
//! - Standard stream capture into per-experiment `stdout`/`stderr` files
//! - The experiment lifecycle: creation, resume, and finalization over
//!   every termination path
//! - The live registry and process-exit plumbing

mod allocate;
pub mod capture;
mod error;
mod experiment;
mod metadata;
mod registry;

pub use allocate::*;
pub use error::*;
pub use experiment::*;
pub use metadata::*;
pub use registry::{exit, finalize_all};
