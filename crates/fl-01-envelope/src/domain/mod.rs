//! # Domain Layer
//!
//! The envelope variants, their routing header, and payload handling.
//! No I/O happens here.

pub mod envelope;
pub mod errors;
pub mod frame;
pub mod header;
pub mod message;
pub mod payload;
