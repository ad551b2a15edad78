//! # Domain Layer

pub mod entry;
pub mod errors;
pub mod stats;
