//! # Domain Layer
//!
//! Rules, key material and canonicalization. Pure logic, no I/O.

pub mod canonical;
pub mod config;
pub mod errors;
pub mod keys;
pub mod rules;
