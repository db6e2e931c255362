//! Closed catalog of domain event types and their typed payloads
//!
//! Event types are dotted, hierarchical names whose first segment names the
//! [`BoundedContext`](super::stream::BoundedContext) producing them. Payloads travel
//! as schema-less maps inside the [`EventEnvelope`]; [`EventPayload`] decodes the ones
//! exchanged between services into concrete structs and keeps everything else as a raw map.

pub mod inventory;
pub mod kitchen;
pub mod menu;
pub mod order;
pub mod reservation;

use super::stream::BoundedContext;
use crate::library::communication::event::{EventData, EventEnvelope, TypedEvent};
use crate::library::communication::CodecError;
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    static ref KNOWN_EVENT_TYPES: HashSet<&'static str> = BoundedContext::ALL
        .iter()
        .flat_map(|context| context.event_types().iter().copied())
        .collect();
}

/// Whether the type is part of the event catalog
pub fn is_known(event_type: &str) -> bool {
    KNOWN_EVENT_TYPES.contains(event_type)
}

/// Number of event types in the catalog
pub fn catalog_size() -> usize {
    KNOWN_EVENT_TYPES.len()
}

/// Decoded payload of an envelope, tagged by its event type
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// [`order::CREATED`]
    OrderCreated(order::OrderCreated),
    /// [`order::PAID`]
    OrderPaid(order::OrderPaid),
    /// [`order::STATUS_CHANGED`]
    OrderStatusChanged(order::OrderStatusChanged),
    /// [`order::CANCELLED`]
    OrderCancelled(order::OrderCancelled),
    /// [`kitchen::ORDER_CREATED`]
    KitchenOrderCreated(kitchen::KitchenOrderCreated),
    /// [`kitchen::ORDER_STATUS_CHANGED`]
    KitchenOrderStatusChanged(kitchen::KitchenOrderStatusChanged),
    /// [`kitchen::ORDER_CANCELLED`]
    KitchenOrderCancelled(kitchen::KitchenOrderCancelled),
    /// [`menu::ITEM_AVAILABILITY_CHANGED`]
    MenuItemAvailabilityChanged(menu::MenuItemAvailabilityChanged),
    /// [`inventory::STOCK_RECEIVED`]
    StockReceived(inventory::StockReceived),
    /// [`inventory::STOCK_USED`]
    StockUsed(inventory::StockUsed),
    /// [`inventory::ALERT_LOW_STOCK`]
    LowStock(inventory::LowStockAlert),
    /// [`inventory::ALERT_OUT_OF_STOCK`]
    OutOfStock(inventory::OutOfStockAlert),
    /// Any other type, known or not, with its raw payload
    Other {
        /// Type of the event
        event_type: String,
        /// Raw payload
        data: EventData,
    },
}

impl EventPayload {
    /// Decodes the payload of an envelope based on its type
    pub fn decode(envelope: &EventEnvelope) -> Result<Self, CodecError> {
        let payload = match envelope.event_type() {
            order::CREATED => Self::OrderCreated(envelope.payload()?),
            order::PAID => Self::OrderPaid(envelope.payload()?),
            order::STATUS_CHANGED => Self::OrderStatusChanged(envelope.payload()?),
            order::CANCELLED => Self::OrderCancelled(envelope.payload()?),
            kitchen::ORDER_CREATED => Self::KitchenOrderCreated(envelope.payload()?),
            kitchen::ORDER_STATUS_CHANGED => Self::KitchenOrderStatusChanged(envelope.payload()?),
            kitchen::ORDER_CANCELLED => Self::KitchenOrderCancelled(envelope.payload()?),
            menu::ITEM_AVAILABILITY_CHANGED => {
                Self::MenuItemAvailabilityChanged(envelope.payload()?)
            }
            inventory::STOCK_RECEIVED => Self::StockReceived(envelope.payload()?),
            inventory::STOCK_USED => Self::StockUsed(envelope.payload()?),
            inventory::ALERT_LOW_STOCK => Self::LowStock(envelope.payload()?),
            inventory::ALERT_OUT_OF_STOCK => Self::OutOfStock(envelope.payload()?),
            other => Self::Other {
                event_type: other.to_owned(),
                data: envelope.data().clone(),
            },
        };

        Ok(payload)
    }

    /// Type of the event carrying this payload
    pub fn event_type(&self) -> &str {
        match self {
            Self::OrderCreated(_) => order::OrderCreated::EVENT_TYPE,
            Self::OrderPaid(_) => order::OrderPaid::EVENT_TYPE,
            Self::OrderStatusChanged(_) => order::OrderStatusChanged::EVENT_TYPE,
            Self::OrderCancelled(_) => order::OrderCancelled::EVENT_TYPE,
            Self::KitchenOrderCreated(_) => kitchen::KitchenOrderCreated::EVENT_TYPE,
            Self::KitchenOrderStatusChanged(_) => kitchen::KitchenOrderStatusChanged::EVENT_TYPE,
            Self::KitchenOrderCancelled(_) => kitchen::KitchenOrderCancelled::EVENT_TYPE,
            Self::MenuItemAvailabilityChanged(_) => {
                menu::MenuItemAvailabilityChanged::EVENT_TYPE
            }
            Self::StockReceived(_) => inventory::StockReceived::EVENT_TYPE,
            Self::StockUsed(_) => inventory::StockUsed::EVENT_TYPE,
            Self::LowStock(_) => inventory::LowStockAlert::EVENT_TYPE,
            Self::OutOfStock(_) => inventory::OutOfStockAlert::EVENT_TYPE,
            Self::Other { event_type, .. } => event_type,
        }
    }
}
