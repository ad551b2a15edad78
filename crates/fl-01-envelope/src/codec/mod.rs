//! # Wire Codec
//!
//! `parse` and `encode` are inverses on canonical frames:
//! `encode(parse(f)) == f` for every well-formed `f`. Whether an envelope
//! is encoded as text or binary follows its payload representation.

mod binary;
mod text;

use crate::domain::envelope::Envelope;
use crate::domain::errors::{EncodeError, MalformedFrame};
use crate::domain::frame::Frame;
use tracing::trace;

/// Parse a raw frame into an envelope.
///
/// Unknown action names are not a parse error; resolving them is the
/// dispatcher's job.
pub fn parse(frame: &Frame) -> Result<Envelope, MalformedFrame> {
    let result = match frame {
        Frame::Text(text) => text::parse(text),
        Frame::Binary(bytes) => binary::parse(bytes.clone()),
    };
    if let Err(e) = &result {
        trace!(
            correlation_id = ?e.correlation_id,
            reason = %e.reason,
            frame_len = frame.len(),
            "Frame rejected by codec"
        );
    }
    result
}

/// Encode an envelope into the frame that carries it.
pub fn encode(envelope: &Envelope) -> Result<Frame, EncodeError> {
    if envelope.is_binary() {
        Ok(Frame::Binary(binary::encode(envelope)?))
    } else {
        Ok(Frame::Text(text::encode(envelope)?))
    }
}
