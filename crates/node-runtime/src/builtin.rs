//! Handlers every node answers regardless of role.

use fl_01_envelope::Message;
use fl_05_dispatch::{DispatchError, HandlerError, HandlerRegistry, HandlerRegistryBuilder};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Liveness probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Heartbeat {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    /// Seconds since the Unix epoch on the answering node.
    pub current_time: u64,
}

impl Message for Heartbeat {
    const ACTION: &'static str = "Heartbeat";
    type Response = HeartbeatResponse;
}

/// Registry builder pre-populated with the built-in handlers.
pub fn builtin_handlers() -> Result<HandlerRegistryBuilder, DispatchError> {
    HandlerRegistry::builder().register_message::<Heartbeat, _, _>(|_, _| async {
        let current_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| HandlerError::failed(e.to_string()))?
            .as_secs();
        Ok::<_, HandlerError>(HeartbeatResponse { current_time })
    })
}
