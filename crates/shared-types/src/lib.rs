//! # Shared Types Crate
//!
//! Identifiers, routing values and the error taxonomy used across all
//! adapter subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-subsystem type is defined here.
//! - **Opaque Identity**: node ids and correlation ids are compared as
//!   strings and never interpreted.
//! - **One Taxonomy**: every failure the engine can report maps onto one
//!   [`ErrorKind`], and every error frame carries one [`ErrorCode`].

pub mod correlation;
pub mod entities;
pub mod errors;

pub use correlation::CorrelationId;
pub use entities::*;
pub use errors::*;
