//! Data Transfer Objects
//!
//! Request and response shapes exchanged between the gateway's HTTP layer and
//! its callers. DTOs are lightweight views of domain entities.

pub mod pipeline;
