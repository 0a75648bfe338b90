//! Service Module
//!
//! Business logic layer for the gateway.
//! Services orchestrate between the repository and the cluster.

pub mod cluster;
pub mod locks;
pub mod pipeline;

pub use pipeline::{PipelineError, PipelineService};
