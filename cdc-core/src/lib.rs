//! CDC Core
//!
//! Core types for the Flink CDC gateway.
//!
//! This crate contains:
//! - Domain types: the persisted pipeline record and its definition
//! - DTOs: request/response shapes used by the HTTP layer
//! - SQL compilation: turning a definition into ordered statements

pub mod domain;
pub mod dto;
pub mod sql;
