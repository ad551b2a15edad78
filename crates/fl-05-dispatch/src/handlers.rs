//! # Handler Registry
//!
//! The action → handler map is assembled once with [`HandlerRegistryBuilder`]
//! and frozen; the dispatcher only ever reads it.

use crate::domain::errors::{DispatchError, HandlerError};
use crate::ports::outbound::{HandlerContext, RequestHandler};
use async_trait::async_trait;
use fl_01_envelope::{Message, Payload, Request};
use shared_types::ErrorCode;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Frozen action → handler map.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<String, Arc<dyn RequestHandler>>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, action: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(action).cloned()
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered actions, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistryBuilder {
    /// Register `handler` for `action`. Each action takes one handler.
    pub fn register(
        mut self,
        action: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, DispatchError> {
        let action = action.into();
        if self.handlers.contains_key(&action) {
            return Err(DispatchError::DuplicateHandler(action));
        }
        self.handlers.insert(action, handler);
        Ok(self)
    }

    /// Register a typed handler for message type `M`.
    pub fn register_message<M, F, Fut>(self, handler: F) -> Result<Self, DispatchError>
    where
        M: Message,
        F: Fn(M, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Response, HandlerError>> + Send + 'static,
    {
        self.register(M::ACTION, Arc::new(MessageHandler::<M, F>::new(handler)))
    }

    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Handler backed by an async closure over the raw request.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as a [`RequestHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Request, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        request: Request,
        context: HandlerContext,
    ) -> Result<Payload, HandlerError> {
        (self.f)(request, context).await
    }
}

/// Handler that deserializes the payload into `M` and serializes
/// `M::Response` back.
pub struct MessageHandler<M, F> {
    f: F,
    _message: PhantomData<fn() -> M>,
}

impl<M, F> MessageHandler<M, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F, Fut> RequestHandler for MessageHandler<M, F>
where
    M: Message,
    F: Fn(M, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<M::Response, HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        request: Request,
        context: HandlerContext,
    ) -> Result<Payload, HandlerError> {
        let message: M = request
            .payload
            .deserialize()
            .map_err(|e| HandlerError::rejected(ErrorCode::FormationViolation, e.to_string()))?;
        let response = (self.f)(message, context).await?;
        Payload::from_serializable(&response).map_err(|e| HandlerError::failed(e.to_string()))
    }
}
