//! Adapter error types.

use crate::domain::config::ConfigError;
use fl_01_envelope::PayloadError;
use fl_02_signature_policy::PolicyError;
use fl_05_dispatch::DispatchError;
use shared_types::RequestFailure;
use thiserror::Error;

/// Errors surfaced by the adapter facade.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("signature policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A typed message could not be converted to or from its payload.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// The outbound call did not produce a response.
    #[error(transparent)]
    Request(#[from] RequestFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
