//! # Envelope Model (FL-01)
//!
//! Typed envelopes for the four protocol message shapes and the codec that
//! maps them to and from transport frames.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): envelopes, routing header, payloads
//! - **Codec** (`codec/`): text (JSON array) and binary (length-prefixed)
//!   framing
//!
//! ## Wire Shapes
//!
//! ```text
//! [2,"<id>","<action>",<payload>(,<header>)]           Request
//! [3,"<id>",<payload>(,<header>)]                      Response
//! [4,"<id>","<code>","<description>",<details>(,<h>)]  RequestError
//! [5,"<id>","<code>","<description>",<details>(,<h>)]  ResponseError
//! ```
//!
//! Payloads are never re-serialized: what was parsed is what gets encoded,
//! so signatures computed by a peer remain verifiable after relaying.

pub mod codec;
pub mod domain;

pub use codec::{encode, parse};
pub use domain::envelope::{Envelope, ErrorFrame, MessageKind, Request, Response};
pub use domain::errors::{EncodeError, MalformedFrame, MalformedReason};
pub use domain::frame::Frame;
pub use domain::header::{Header, Signature, SignatureAlgorithm};
pub use domain::message::Message;
pub use domain::payload::{Payload, PayloadError};
