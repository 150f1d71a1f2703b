#![forbid(unsafe_code)]
//! String-similarity kernels and the comparator registry (components
//! C1–C3).

pub mod cost_model;
pub mod kernels;
pub mod registry;

pub use cost_model::WeightCostModel;
pub use kernels::{optimized_distance, weighted_distance, weighted_similarity};
pub use registry::{Comparator, ComparatorRegistry};
