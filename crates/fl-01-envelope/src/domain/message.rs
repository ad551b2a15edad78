//! # Typed Messages
//!
//! Concrete message types implement [`Message`] so they can be sent and
//! handled without spelling out action names or payload conversions.

use crate::domain::envelope::Request;
use crate::domain::payload::{Payload, PayloadError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A request payload type bound to its action name and response type.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Action name carried in the request frame.
    const ACTION: &'static str;

    /// Payload type of the matching response.
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Wrap this message in a request with a fresh correlation id.
    fn to_request(&self) -> Result<Request, PayloadError> {
        Ok(Request::new(Self::ACTION, Payload::from_serializable(self)?))
    }
}
