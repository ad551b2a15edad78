//! # Domain Layer
//!
//! Decisions, filter context and configuration. No I/O.

pub mod config;
pub mod context;
pub mod decision;
