//! Subscriptions - event type ごとの consumer 登録
//!
//! - `subscribe::<E, _>(name, handler)` で型付き handler を登録
//! - 内部的に `TypedHandler` でラップして `Arc<dyn Consumer>` で管理
//! - 1 つの event type に複数の consumer を登録できる（fan-out）
//!
//! 登録順がそのまま配送順になります。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Event, EventType};
use crate::ports::Consumer;

use super::handler::{Handler, TypedHandler};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("consumer '{consumer}' is already subscribed to '{event_type}'")]
    AlreadySubscribed {
        event_type: EventType,
        consumer: String,
    },
}

#[derive(Default, Clone)]
pub struct Subscriptions {
    consumers: HashMap<EventType, Vec<Arc<dyn Consumer>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E: Event, H: Handler<E> + 'static>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistryError> {
        let typed = TypedHandler::<E, H>::new(name, handler);
        self.subscribe_consumer(EventType::of::<E>(), Arc::new(typed))
    }

    /// Register an untyped consumer, e.g. an `IdempotentConsumer` wrapper.
    pub fn subscribe_consumer(
        &mut self,
        event_type: EventType,
        consumer: Arc<dyn Consumer>,
    ) -> Result<(), RegistryError> {
        let list = self.consumers.entry(event_type.clone()).or_default();
        if list.iter().any(|c| c.name() == consumer.name()) {
            return Err(RegistryError::AlreadySubscribed {
                event_type,
                consumer: consumer.name().to_string(),
            });
        }
        list.push(consumer);
        Ok(())
    }

    pub fn consumers_for(&self, event_type: &EventType) -> &[Arc<dyn Consumer>] {
        self.consumers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn registered_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.consumers.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}
