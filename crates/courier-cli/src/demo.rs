//! Demo domain: an order that is placed, gets lines, and is confirmed.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::ports::Delivery;
use courier_core::{Aggregate, AggregateId, DeliveryError, Event, Handler};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { customer: String, at: DateTime<Utc> },
    LineAdded { sku: String, qty: u32, at: DateTime<Utc> },
    Confirmed { at: DateTime<Utc> },
}

impl Event for OrderEvent {
    const TYPE: &'static str = "demo.order.v1";

    fn occurred_on(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed { at, .. }
            | OrderEvent::LineAdded { at, .. }
            | OrderEvent::Confirmed { at } => *at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer: String,
    pub lines: Vec<(String, u32)>,
    pub confirmed: bool,
}

impl Order {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            customer: String::new(),
            lines: Vec::new(),
            confirmed: false,
        }
    }
}

impl Aggregate for Order {
    const KIND: &'static str = "order";
    type Event = OrderEvent;

    fn id(&self) -> AggregateId {
        AggregateId::new(self.id.clone())
    }

    fn apply(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::Placed { customer, .. } => self.customer = customer.clone(),
            OrderEvent::LineAdded { sku, qty, .. } => self.lines.push((sku.clone(), *qty)),
            OrderEvent::Confirmed { .. } => self.confirmed = true,
        }
    }
}

/// Sends a receipt on confirmation; the first `failures` calls fail like a
/// flaky mail gateway.
pub struct Receipts {
    failures_left: AtomicU32,
}

impl Receipts {
    pub fn new(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Handler<OrderEvent> for Receipts {
    async fn handle(&self, event: OrderEvent, delivery: &Delivery) -> Result<(), DeliveryError> {
        let OrderEvent::Confirmed { .. } = event else {
            return Ok(());
        };
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(DeliveryError::Transient(format!(
                "mail gateway unavailable (left={left})"
            )));
        }
        tracing::info!(
            order = %delivery.record.aggregate_id(),
            dedup_key = %delivery.dedup_key,
            "receipt sent"
        );
        Ok(())
    }
}

/// Prints every event of an order in the order it arrives.
pub struct Timeline;

#[async_trait]
impl Handler<OrderEvent> for Timeline {
    async fn handle(&self, event: OrderEvent, delivery: &Delivery) -> Result<(), DeliveryError> {
        println!(
            "{} #{} {:?}",
            delivery.record.aggregate_id(),
            delivery.record.sequence(),
            event
        );
        Ok(())
    }
}
