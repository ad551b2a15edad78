//! Binary framing.
//!
//! ```text
//! u8   message type (2..=5)
//! u16  correlation id length, then UTF-8 bytes
//! u16  action length, then UTF-8 bytes              (requests)
//! u16  error code length, then UTF-8 bytes          (errors)
//! u16  error description length, then UTF-8 bytes   (errors)
//! u32  header JSON length (0 = no header), then bytes
//! u32  body length, then bytes
//! ```
//!
//! All integers are big-endian.

use crate::domain::envelope::{Envelope, ErrorFrame, MessageKind, Request, Response};
use crate::domain::errors::{EncodeError, MalformedFrame, MalformedReason};
use crate::domain::header::Header;
use crate::domain::payload::Payload;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared_types::{CorrelationId, ErrorCode};

pub(crate) fn parse(mut buf: Bytes) -> Result<Envelope, MalformedFrame> {
    if !buf.has_remaining() {
        return Err(MalformedFrame::new(MalformedReason::Empty));
    }

    let type_id = buf.get_u8();
    let kind = MessageKind::from_type_id(u64::from(type_id));
    let correlation_id = read_str16(&mut buf, "correlationId").map(CorrelationId::from);

    let Some(kind) = kind else {
        return Err(
            MalformedFrame::new(MalformedReason::UnsupportedMessageType(type_id.to_string()))
                .with_context(correlation_id.ok(), None),
        );
    };

    let recovered = correlation_id.as_ref().ok().cloned();
    let fail = |reason| MalformedFrame::new(reason).with_context(recovered.clone(), Some(kind));

    let id = correlation_id.map_err(fail)?;

    let envelope = match kind {
        MessageKind::Request => {
            let action = read_str16(&mut buf, "action").map_err(fail)?;
            let header = read_header(&mut buf).map_err(fail)?;
            let body = read_bytes32(&mut buf, "body").map_err(fail)?;
            Envelope::Request(Request {
                correlation_id: id,
                action,
                payload: Payload::binary(body),
                header,
            })
        }
        MessageKind::Response => {
            let header = read_header(&mut buf).map_err(fail)?;
            let body = read_bytes32(&mut buf, "body").map_err(fail)?;
            Envelope::Response(Response {
                correlation_id: id,
                payload: Payload::binary(body),
                header,
            })
        }
        MessageKind::RequestError | MessageKind::ResponseError => {
            let code = read_str16(&mut buf, "errorCode").map_err(fail)?;
            let description = read_str16(&mut buf, "errorDescription").map_err(fail)?;
            let header = read_header(&mut buf).map_err(fail)?;
            let body = read_bytes32(&mut buf, "body").map_err(fail)?;
            let error = ErrorFrame {
                correlation_id: id,
                code: ErrorCode::from(code),
                description,
                details: Payload::binary(body),
                header,
            };
            if kind == MessageKind::RequestError {
                Envelope::RequestError(error)
            } else {
                Envelope::ResponseError(error)
            }
        }
    };

    if buf.has_remaining() {
        return Err(fail(MalformedReason::TrailingBytes(buf.remaining())));
    }

    Ok(envelope)
}

fn read_bytes16(buf: &mut Bytes, field: &'static str) -> Result<Bytes, MalformedReason> {
    if buf.remaining() < 2 {
        return Err(MalformedReason::Truncated(field));
    }
    let len = usize::from(buf.get_u16());
    if buf.remaining() < len {
        return Err(MalformedReason::Truncated(field));
    }
    Ok(buf.split_to(len))
}

fn read_bytes32(buf: &mut Bytes, field: &'static str) -> Result<Bytes, MalformedReason> {
    if buf.remaining() < 4 {
        return Err(MalformedReason::Truncated(field));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(MalformedReason::Truncated(field));
    }
    Ok(buf.split_to(len))
}

fn read_str16(buf: &mut Bytes, field: &'static str) -> Result<String, MalformedReason> {
    let raw = read_bytes16(buf, field)?;
    String::from_utf8(raw.to_vec()).map_err(|e| MalformedReason::InvalidField {
        field,
        detail: e.to_string(),
    })
}

fn read_header(buf: &mut Bytes) -> Result<Header, MalformedReason> {
    let raw = read_bytes32(buf, "header")?;
    if raw.is_empty() {
        return Ok(Header::default());
    }
    serde_json::from_slice(&raw).map_err(|e| MalformedReason::InvalidField {
        field: "header",
        detail: e.to_string(),
    })
}

pub(crate) fn encode(envelope: &Envelope) -> Result<Bytes, EncodeError> {
    let header = envelope.header();
    let header_json = if header.is_empty() {
        Vec::new()
    } else {
        serde_json::to_vec(header).map_err(|e| EncodeError::Serialize {
            field: "header",
            detail: e.to_string(),
        })?
    };
    let body = envelope.payload().as_bytes();

    let mut out = BytesMut::with_capacity(64 + header_json.len() + body.len());
    out.put_u8(envelope.kind().type_id());
    put16(&mut out, "correlationId", envelope.correlation_id().as_str().as_bytes())?;

    match envelope {
        Envelope::Request(request) => put16(&mut out, "action", request.action.as_bytes())?,
        Envelope::Response(_) => {}
        Envelope::RequestError(error) | Envelope::ResponseError(error) => {
            put16(&mut out, "errorCode", error.code.as_str().as_bytes())?;
            put16(&mut out, "errorDescription", error.description.as_bytes())?;
        }
    }

    put32(&mut out, "header", &header_json)?;
    put32(&mut out, "body", body)?;
    Ok(out.freeze())
}

fn put16(out: &mut BytesMut, field: &'static str, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::FieldTooLong {
        field,
        len: bytes.len(),
        max: usize::from(u16::MAX),
    })?;
    out.put_u16(len);
    out.put_slice(bytes);
    Ok(())
}

fn put32(out: &mut BytesMut, field: &'static str, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| EncodeError::FieldTooLong {
        field,
        len: bytes.len(),
        max: u32::MAX as usize,
    })?;
    out.put_u32(len);
    out.put_slice(bytes);
    Ok(())
}
