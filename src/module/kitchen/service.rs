use crate::domain::event::kitchen::{
    KitchenOrderCancelled, KitchenOrderCreated, KitchenOrderStatus, KitchenOrderStatusChanged,
};
use crate::domain::event::order::{self, OrderCancelled, OrderCreated, OrderItem, OrderPaid};
use crate::domain::event::EventPayload;
use crate::domain::stream::{ConsumerBinding, KITCHEN_EVENTS, KITCHEN_ORDERS};
use crate::harness::Service;
use crate::library::communication::event::{
    EventEnvelope, EventHandler, EventPublisher, HandlerContext, Subscription, TypedEvent,
};
use crate::library::EmptyResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Preparation state of one order as known to the kitchen
#[derive(Debug, Clone, PartialEq)]
pub struct KitchenTicket {
    /// Items to prepare
    pub items: Vec<OrderItem>,
    /// Current preparation state
    pub status: KitchenOrderStatus,
}

/// Creates kitchen tickets for incoming orders and starts preparing them once paid
///
/// Consumes:
/// - [`order::CREATED`]
/// - [`order::PAID`]
/// - [`order::CANCELLED`]
///
/// Publishes:
/// - [`KitchenOrderCreated`]
/// - [`KitchenOrderStatusChanged`]
/// - [`KitchenOrderCancelled`]
///
/// Redeliveries are absorbed by the board of tickets keyed by order id,
/// an event is only published when it changes the state of a ticket.
pub struct KitchenService {
    publisher: Arc<dyn EventPublisher>,
    board: Mutex<HashMap<String, KitchenTicket>>,
}

impl Service for KitchenService {
    const NAME: &'static str = "KitchenService";
    const PUBLISHES: &'static str = KITCHEN_EVENTS;
    const BINDING: ConsumerBinding = KITCHEN_ORDERS;

    type Config = ();

    fn instantiate(publisher: Arc<dyn EventPublisher>, _config: &Self::Config) -> Self {
        Self {
            publisher,
            board: Mutex::new(HashMap::new()),
        }
    }

    fn subscriptions(service: Arc<Self>) -> Vec<Subscription> {
        vec![Subscription::shared(
            &[order::CREATED, order::PAID, order::CANCELLED],
            service,
        )]
    }
}

impl KitchenService {
    /// Ticket of the given order, if the kitchen knows about it
    pub async fn ticket(&self, order_id: &str) -> Option<KitchenTicket> {
        self.board.lock().await.get(order_id).cloned()
    }

    async fn publish<T: TypedEvent>(&self, cause: &EventEnvelope, event: &T) -> EmptyResult {
        let envelope = EventEnvelope::from_event(event)?.caused_by(cause);
        self.publisher.publish(&envelope).await?;
        Ok(())
    }

    async fn order_created(&self, cause: &EventEnvelope, order: OrderCreated) -> EmptyResult {
        let mut board = self.board.lock().await;

        if board.contains_key(&order.order_id) {
            debug!(order_id = order.order_id.as_str(), "Ticket already exists");
            return Ok(());
        }

        let event = KitchenOrderCreated {
            order_id: order.order_id.clone(),
            items: order.items.clone(),
            status: KitchenOrderStatus::Received,
        };

        self.publish(cause, &event).await?;

        info!(order_id = order.order_id.as_str(), items = order.items.len(), "Ticket created");
        board.insert(
            order.order_id,
            KitchenTicket {
                items: order.items,
                status: KitchenOrderStatus::Received,
            },
        );

        Ok(())
    }

    async fn order_paid(&self, cause: &EventEnvelope, payment: OrderPaid) -> EmptyResult {
        let mut board = self.board.lock().await;

        let ticket = match board.get_mut(&payment.order_id) {
            Some(ticket) => ticket,
            None => {
                warn!(order_id = payment.order_id.as_str(), "Payment for unknown order");
                return Ok(());
            }
        };

        if ticket.status != KitchenOrderStatus::Received {
            debug!(order_id = payment.order_id.as_str(), status = %ticket.status, "Payment does not change ticket");
            return Ok(());
        }

        let event = KitchenOrderStatusChanged {
            order_id: payment.order_id.clone(),
            previous_status: ticket.status,
            status: KitchenOrderStatus::Preparing,
        };

        self.publish(cause, &event).await?;

        info!(order_id = payment.order_id.as_str(), "Started preparing order");
        ticket.status = KitchenOrderStatus::Preparing;

        Ok(())
    }

    async fn order_cancelled(&self, cause: &EventEnvelope, cancellation: OrderCancelled) -> EmptyResult {
        let mut board = self.board.lock().await;

        let ticket = match board.get_mut(&cancellation.order_id) {
            Some(ticket) => ticket,
            None => {
                debug!(order_id = cancellation.order_id.as_str(), "Cancellation for unknown order");
                return Ok(());
            }
        };

        if ticket.status == KitchenOrderStatus::Cancelled {
            return Ok(());
        }

        let event = KitchenOrderCancelled {
            order_id: cancellation.order_id.clone(),
            reason: cancellation.reason,
        };

        self.publish(cause, &event).await?;

        info!(order_id = cancellation.order_id.as_str(), "Ticket cancelled");
        ticket.status = KitchenOrderStatus::Cancelled;

        Ok(())
    }
}

#[async_trait]
impl EventHandler for KitchenService {
    async fn handle(&self, _context: &HandlerContext, envelope: &EventEnvelope) -> EmptyResult {
        match EventPayload::decode(envelope)? {
            EventPayload::OrderCreated(order) => self.order_created(envelope, order).await,
            EventPayload::OrderPaid(payment) => self.order_paid(envelope, payment).await,
            EventPayload::OrderCancelled(cancellation) => {
                self.order_cancelled(envelope, cancellation).await
            }
            other => {
                debug!(event_type = other.event_type(), "Event is of no interest to the kitchen");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::event::kitchen;
    use crate::library::communication::event::{
        metadata, EventData, MessageId, Publisher, StreamDescriptor,
    };
    use crate::library::communication::implementation::memory::MemoryBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::watch;

    fn kitchen_service(backend: &MemoryBackend) -> KitchenService {
        let publisher = Publisher::new(backend.client(), StreamDescriptor::new(KITCHEN_EVENTS));
        KitchenService::instantiate(Arc::new(publisher), &())
    }

    fn context() -> HandlerContext {
        let (_, stop) = watch::channel(false);
        HandlerContext::new(
            KITCHEN_ORDERS.stream,
            KITCHEN_ORDERS.group,
            KITCHEN_ORDERS.consumer,
            MessageId::new(1, 0),
            stop,
        )
    }

    fn created(order_id: &str) -> EventEnvelope {
        EventEnvelope::from_event(&OrderCreated {
            order_id: order_id.into(),
            table_id: Some("T-4".into()),
            items: vec![OrderItem {
                menu_item_id: "burger".into(),
                name: "Burger".into(),
                quantity: 2,
                notes: None,
            }],
            total_amount: 25.0,
        })
        .unwrap()
        .with_metadata(metadata::TRACE_ID, "trace-1")
    }

    fn paid(order_id: &str) -> EventEnvelope {
        EventEnvelope::from_event(&OrderPaid {
            order_id: order_id.into(),
            amount: 25.0,
            payment_method: None,
        })
        .unwrap()
    }

    fn cancelled(order_id: &str) -> EventEnvelope {
        EventEnvelope::from_event(&OrderCancelled {
            order_id: order_id.into(),
            reason: Some("guest left".into()),
        })
        .unwrap()
    }

    fn published_types(backend: &MemoryBackend) -> Vec<String> {
        backend
            .records(KITCHEN_EVENTS)
            .iter()
            .map(|record| record.envelope().unwrap().event_type().to_owned())
            .collect()
    }

    #[test]
    fn subscribe_to_the_order_lifecycle() {
        let backend = MemoryBackend::new();
        let subscriptions = KitchenService::subscriptions(Arc::new(kitchen_service(&backend)));

        assert_eq!(subscriptions.len(), 1);
        assert_eq!(
            subscriptions[0].event_types(),
            &["order.created", "order.paid", "order.cancelled"]
        );
    }

    #[tokio::test]
    async fn create_a_ticket_for_new_orders() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);
        let order = created("O-1");

        service.handle(&context(), &order).await.unwrap();

        let records = backend.records(KITCHEN_EVENTS);
        assert_eq!(records.len(), 1);

        let envelope = records[0].envelope().unwrap();
        let payload: KitchenOrderCreated = envelope.payload().unwrap();
        assert_eq!(envelope.aggregate_id(), "O-1");
        assert_eq!(payload.status, KitchenOrderStatus::Received);
        assert_eq!(payload.items[0].quantity, 2);
        assert_eq!(envelope.metadata()[metadata::TRACE_ID], json!("trace-1"));
        assert_eq!(envelope.metadata()[metadata::CORRELATION_ID], json!(order.id()));

        assert_eq!(
            service.ticket("O-1").await.map(|t| t.status),
            Some(KitchenOrderStatus::Received)
        );
    }

    #[tokio::test]
    async fn absorb_redelivered_orders() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);
        let order = created("O-1");

        service.handle(&context(), &order).await.unwrap();
        service.handle(&context(), &order).await.unwrap();

        assert_eq!(published_types(&backend), vec![kitchen::ORDER_CREATED]);
    }

    #[tokio::test]
    async fn start_preparing_once_paid() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);

        service.handle(&context(), &created("O-1")).await.unwrap();
        service.handle(&context(), &paid("O-1")).await.unwrap();
        service.handle(&context(), &paid("O-1")).await.unwrap();

        assert_eq!(
            published_types(&backend),
            vec![kitchen::ORDER_CREATED, kitchen::ORDER_STATUS_CHANGED]
        );

        let change: KitchenOrderStatusChanged = backend.records(KITCHEN_EVENTS)[1]
            .envelope()
            .unwrap()
            .payload()
            .unwrap();
        assert_eq!(change.previous_status, KitchenOrderStatus::Received);
        assert_eq!(change.status, KitchenOrderStatus::Preparing);
    }

    #[tokio::test]
    async fn cancel_tickets_once() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);

        service.handle(&context(), &created("O-1")).await.unwrap();
        service.handle(&context(), &cancelled("O-1")).await.unwrap();
        service.handle(&context(), &cancelled("O-1")).await.unwrap();
        service.handle(&context(), &paid("O-1")).await.unwrap();

        assert_eq!(
            published_types(&backend),
            vec![kitchen::ORDER_CREATED, kitchen::ORDER_CANCELLED]
        );
        assert_eq!(
            service.ticket("O-1").await.map(|t| t.status),
            Some(KitchenOrderStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn ignore_events_for_unknown_orders() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);

        service.handle(&context(), &paid("O-404")).await.unwrap();
        service.handle(&context(), &cancelled("O-404")).await.unwrap();

        assert!(backend.records(KITCHEN_EVENTS).is_empty());
    }

    #[tokio::test]
    async fn reject_orders_violating_the_schema() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);
        let broken = EventEnvelope::new(order::CREATED, "O-1", EventData::new());

        assert!(service.handle(&context(), &broken).await.is_err());
        assert_eq!(service.ticket("O-1").await, None);
    }

    #[tokio::test]
    async fn keep_the_ticket_unchanged_when_publishing_fails() {
        let backend = MemoryBackend::new();
        let service = kitchen_service(&backend);
        backend.set_reachable(false);

        assert!(service.handle(&context(), &created("O-1")).await.is_err());
        assert_eq!(service.ticket("O-1").await, None);

        backend.set_reachable(true);
        service.handle(&context(), &created("O-1")).await.unwrap();
        assert_eq!(published_types(&backend), vec![kitchen::ORDER_CREATED]);
    }
}
