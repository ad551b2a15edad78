//! Text framing: one JSON array per frame.

use crate::domain::envelope::{Envelope, ErrorFrame, MessageKind, Request, Response};
use crate::domain::errors::{EncodeError, MalformedFrame, MalformedReason};
use crate::domain::header::Header;
use crate::domain::payload::Payload;
use serde_json::value::RawValue;
use shared_types::{CorrelationId, ErrorCode};

pub(crate) fn parse(text: &str) -> Result<Envelope, MalformedFrame> {
    if text.trim().is_empty() {
        return Err(MalformedFrame::new(MalformedReason::Empty));
    }

    let elements: Vec<&RawValue> = serde_json::from_str(text)
        .map_err(|e| MalformedFrame::new(MalformedReason::NotAnArray(e.to_string())))?;

    // Recovered before anything else can fail so the sender can be answered.
    let correlation_id = elements
        .get(1)
        .and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
        .map(CorrelationId::from);

    let Some(type_raw) = elements.first() else {
        return Err(MalformedFrame::new(MalformedReason::WrongArity {
            expected: "at least 3",
            found: 0,
        }));
    };

    let type_id = serde_json::from_str::<u64>(type_raw.get()).map_err(|_| {
        MalformedFrame::new(MalformedReason::InvalidField {
            field: "messageTypeId",
            detail: format!("expected an integer, found {}", type_raw.get()),
        })
        .with_context(correlation_id.clone(), None)
    })?;

    let kind = MessageKind::from_type_id(type_id).ok_or_else(|| {
        MalformedFrame::new(MalformedReason::UnsupportedMessageType(type_id.to_string()))
            .with_context(correlation_id.clone(), None)
    })?;

    let fail = |reason| MalformedFrame::new(reason).with_context(correlation_id.clone(), Some(kind));

    let (min, max, expected) = match kind {
        MessageKind::Request => (4, 5, "4 or 5"),
        MessageKind::Response => (3, 4, "3 or 4"),
        MessageKind::RequestError | MessageKind::ResponseError => (5, 6, "5 or 6"),
    };
    if elements.len() < min || elements.len() > max {
        return Err(fail(MalformedReason::WrongArity {
            expected,
            found: elements.len(),
        }));
    }

    let id = correlation_id.clone().ok_or_else(|| {
        fail(MalformedReason::InvalidField {
            field: "correlationId",
            detail: "expected a string".into(),
        })
    })?;

    let envelope = match kind {
        MessageKind::Request => Envelope::Request(Request {
            correlation_id: id,
            action: string_field(elements[2], "action").map_err(fail)?,
            payload: json_field(elements[3]),
            header: header_field(elements.get(4).copied()).map_err(fail)?,
        }),
        MessageKind::Response => Envelope::Response(Response {
            correlation_id: id,
            payload: json_field(elements[2]),
            header: header_field(elements.get(3).copied()).map_err(fail)?,
        }),
        MessageKind::RequestError | MessageKind::ResponseError => {
            let error = ErrorFrame {
                correlation_id: id,
                code: ErrorCode::from(string_field(elements[2], "errorCode").map_err(fail)?),
                description: string_field(elements[3], "errorDescription").map_err(fail)?,
                details: json_field(elements[4]),
                header: header_field(elements.get(5).copied()).map_err(fail)?,
            };
            if kind == MessageKind::RequestError {
                Envelope::RequestError(error)
            } else {
                Envelope::ResponseError(error)
            }
        }
    };

    Ok(envelope)
}

fn string_field(raw: &RawValue, field: &'static str) -> Result<String, MalformedReason> {
    serde_json::from_str(raw.get()).map_err(|_| MalformedReason::InvalidField {
        field,
        detail: format!("expected a string, found {}", raw.get()),
    })
}

fn json_field(raw: &RawValue) -> Payload {
    Payload::from_validated_json(raw.get().to_string())
}

fn header_field(raw: Option<&RawValue>) -> Result<Header, MalformedReason> {
    match raw {
        None => Ok(Header::default()),
        Some(raw) => serde_json::from_str(raw.get()).map_err(|e| MalformedReason::InvalidField {
            field: "header",
            detail: e.to_string(),
        }),
    }
}

pub(crate) fn encode(envelope: &Envelope) -> Result<String, EncodeError> {
    let payload = envelope.payload();
    let mut out = String::with_capacity(64 + payload.as_bytes().len());

    out.push('[');
    out.push_str(&envelope.kind().type_id().to_string());
    push_string(&mut out, envelope.correlation_id().as_str(), "correlationId")?;

    match envelope {
        Envelope::Request(request) => {
            push_string(&mut out, &request.action, "action")?;
        }
        Envelope::Response(_) => {}
        Envelope::RequestError(error) | Envelope::ResponseError(error) => {
            push_string(&mut out, error.code.as_str(), "errorCode")?;
            push_string(&mut out, &error.description, "errorDescription")?;
        }
    }

    let json = payload.as_json().ok_or(EncodeError::Serialize {
        field: "payload",
        detail: "binary payload cannot be carried in a text frame".into(),
    })?;
    out.push(',');
    out.push_str(json);

    let header = envelope.header();
    if !header.is_empty() {
        let header_json = serde_json::to_string(header).map_err(|e| EncodeError::Serialize {
            field: "header",
            detail: e.to_string(),
        })?;
        out.push(',');
        out.push_str(&header_json);
    }

    out.push(']');
    Ok(out)
}

fn push_string(out: &mut String, value: &str, field: &'static str) -> Result<(), EncodeError> {
    let quoted = serde_json::to_string(value).map_err(|e| EncodeError::Serialize {
        field,
        detail: e.to_string(),
    })?;
    out.push(',');
    out.push_str(&quoted);
    Ok(())
}
