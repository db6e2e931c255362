//! Events published by the order service into `order-events`

use crate::library::communication::event::TypedEvent;
use serde::{Deserialize, Serialize};

/// Order has been placed
pub const CREATED: &str = "order.created";
/// Items of an order have been changed
pub const UPDATED: &str = "order.updated";
/// Order has been paid
pub const PAID: &str = "order.paid";
/// Order moved into another state of its lifecycle
pub const STATUS_CHANGED: &str = "order.status.changed";
/// Order has been cancelled by the guest or the staff
pub const CANCELLED: &str = "order.cancelled";
/// Order has been served and settled
pub const COMPLETED: &str = "order.completed";

/// Every event type of the order context
pub const ALL: [&str; 6] = [CREATED, UPDATED, PAID, STATUS_CHANGED, CANCELLED, COMPLETED];

/// Line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Menu item which has been ordered
    pub menu_item_id: String,
    /// Display name at the time of ordering
    #[serde(default)]
    pub name: String,
    /// Number of portions
    pub quantity: u32,
    /// Special requests of the guest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Payload of [`CREATED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Identifier of the order
    pub order_id: String,
    /// Table the order belongs to, absent for take-away orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    /// Ordered items
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Sum of all items
    pub total_amount: f64,
}

impl TypedEvent for OrderCreated {
    const EVENT_TYPE: &'static str = CREATED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}

/// Payload of [`PAID`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaid {
    /// Identifier of the order
    pub order_id: String,
    /// Amount that has been paid
    pub amount: f64,
    /// Means of payment, e.g. `card` or `cash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl TypedEvent for OrderPaid {
    const EVENT_TYPE: &'static str = PAID;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}

/// Payload of [`STATUS_CHANGED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    /// Identifier of the order
    pub order_id: String,
    /// Status before the change
    pub previous_status: String,
    /// Status after the change
    pub status: String,
}

impl TypedEvent for OrderStatusChanged {
    const EVENT_TYPE: &'static str = STATUS_CHANGED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}

/// Payload of [`CANCELLED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Identifier of the order
    pub order_id: String,
    /// Reason given for the cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TypedEvent for OrderCancelled {
    const EVENT_TYPE: &'static str = CANCELLED;

    fn aggregate_id(&self) -> String {
        self.order_id.clone()
    }
}
