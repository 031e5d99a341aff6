//! Handler trait - 型付きの event handler
//!
//! # 二層構造
//! - `Handler<E>`: アプリが実装する。`E` しか受け取れない
//! - `TypedHandler<E, H>`: payload を decode して `Handler<E>` に渡す
//!   `Consumer` 実装（type erasure）

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::domain::{DeliveryError, Event};
use crate::ports::{Consumer, Delivery};

/// Handler は 1 種類の Event を処理する
///
/// # 使用例
/// ```ignore
/// struct SendReceipt;
///
/// #[async_trait]
/// impl Handler<OrderPlaced> for SendReceipt {
///     async fn handle(&self, event: OrderPlaced, delivery: &Delivery) -> Result<(), DeliveryError> {
///         mailer.send(event.customer, delivery.dedup_key.as_str()).await
///     }
/// }
/// ```
///
/// `delivery.dedup_key` is the idempotency key to honour on redelivery.
#[async_trait]
pub trait Handler<E: Event>: Send + Sync {
    async fn handle(&self, event: E, delivery: &Delivery) -> Result<(), DeliveryError>;
}

pub struct TypedHandler<E: Event, H: Handler<E>> {
    name: String,
    handler: H,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Event, H: Handler<E>> TypedHandler<E, H> {
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Event, H: Handler<E>> Consumer for TypedHandler<E, H> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        // 型が合わない payload は何度やり直しても直らない -> Decode (permanent)
        let event: E = delivery.record.decode()?;
        self.handler.handle(event, delivery).await
    }
}
