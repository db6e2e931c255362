//! Events published by the kitchen service into `kitchen-events`

use super::order::OrderItem;
use crate::library::communication::event::TypedEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order has been received by the kitchen
pub const ORDER_CREATED: &str = "kitchen.order.created";
/// Preparation of an order progressed
pub const ORDER_STATUS_CHANGED: &str = "kitchen.order.status.changed";
/// Order has been assigned to a station or cook
pub const ORDER_ASSIGNED: &str = "kitchen.order.assigned";
/// Order has been (de-)prioritized
pub const ORDER_PRIORITY_CHANGED: &str = "kitchen.order.priority.changed";
/// All items of an order are ready
pub const ORDER_COMPLETED: &str = "kitchen.order.completed";
/// Preparation of an order has been abandoned
pub const ORDER_CANCELLED: &str = "kitchen.order.cancelled";
/// Preparation of a single item progressed
pub const ITEM_STATUS_CHANGED: &str = "kitchen.item.status.changed";

/// Every event type of the kitchen context
pub const ALL: [&str; 7] = [
    ORDER_CREATED,
    ORDER_STATUS_CHANGED,
    ORDER_ASSIGNED,
    ORDER_PRIORITY_CHANGED,
    ORDER_COMPLETED,
    ORDER_CANCELLED,
    ITEM_STATUS_CHANGED,
];

/// Preparation state of an order in the kitchen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KitchenOrderStatus {
    /// Known to the kitchen but not paid yet
    Received,
    /// Paid and being prepared
    Preparing,
    /// Ready to be served
    Ready,
    /// Abandoned
    Cancelled,
}

impl fmt::Display for KitchenOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KitchenOrderStatus::Received => "received",
            KitchenOrderStatus::Preparing => "preparing",
            KitchenOrderStatus::Ready => "ready",
            KitchenOrderStatus::Cancelled => "cancelled",
        };

        f.write_str(name)
    }
}

/// Payload of [`ORDER_CREATED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrderCreated {
    /// Identifier of the originating order
    pub order_id: String,
    /// Items to prepare
    pub items: Vec<OrderItem>,
    /// Initial status
    pub status: KitchenOrderStatus,
}

impl TypedEvent for KitchenOrderCreated {
    const EVENT_TYPE: &'static str = ORDER_CREATED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}

/// Payload of [`ORDER_STATUS_CHANGED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrderStatusChanged {
    /// Identifier of the originating order
    pub order_id: String,
    /// Status before the change
    pub previous_status: KitchenOrderStatus,
    /// Status after the change
    pub status: KitchenOrderStatus,
}

impl TypedEvent for KitchenOrderStatusChanged {
    const EVENT_TYPE: &'static str = ORDER_STATUS_CHANGED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}

/// Payload of [`ORDER_CANCELLED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrderCancelled {
    /// Identifier of the originating order
    pub order_id: String,
    /// Reason given for the cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TypedEvent for KitchenOrderCancelled {
    const EVENT_TYPE: &'static str = ORDER_CANCELLED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}
