//! Core domain types
//!
//! The pipeline record and its definition, shared between the registry (for
//! persistence) and the orchestrator (for lifecycle control).

pub mod pipeline;
