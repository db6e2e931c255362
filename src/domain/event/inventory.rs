//! Events published by the inventory service into `inventory-events`

use crate::library::communication::event::TypedEvent;
use serde::{Deserialize, Serialize};

/// Inventory item has been created
pub const ITEM_CREATED: &str = "inventory.item.created";
/// Inventory item has been changed
pub const ITEM_UPDATED: &str = "inventory.item.updated";
/// Delivery has been booked into stock
pub const STOCK_RECEIVED: &str = "inventory.stock.received";
/// Stock has been consumed
pub const STOCK_USED: &str = "inventory.stock.used";
/// Stock has been corrected manually
pub const STOCK_ADJUSTED: &str = "inventory.stock.adjusted";
/// Stock fell below its reorder threshold
pub const ALERT_LOW_STOCK: &str = "inventory.alert.low_stock";
/// Stock has been depleted
pub const ALERT_OUT_OF_STOCK: &str = "inventory.alert.out_of_stock";
/// Stock has been set aside for an order
pub const STOCK_RESERVED: &str = "inventory.stock.reserved";
/// Supplier has been created
pub const SUPPLIER_CREATED: &str = "inventory.supplier.created";
/// Supplier has been changed
pub const SUPPLIER_UPDATED: &str = "inventory.supplier.updated";

/// Every event type of the inventory context
pub const ALL: [&str; 10] = [
    ITEM_CREATED,
    ITEM_UPDATED,
    STOCK_RECEIVED,
    STOCK_USED,
    STOCK_ADJUSTED,
    ALERT_LOW_STOCK,
    ALERT_OUT_OF_STOCK,
    STOCK_RESERVED,
    SUPPLIER_CREATED,
    SUPPLIER_UPDATED,
];

/// Payload of [`STOCK_RECEIVED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReceived {
    /// Identifier of the inventory item
    pub item_id: String,
    /// Received quantity
    pub quantity: f64,
    /// Stock after the delivery has been booked
    pub current_quantity: f64,
    /// Menu items which use this inventory item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_item_ids: Vec<String>,
}

impl TypedEvent for StockReceived {
    const EVENT_TYPE: &'static str = STOCK_RECEIVED;

    fn aggregate_id(&self) -> String {
        self.item_id.clone()
    }
}

/// Payload of [`STOCK_USED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUsed {
    /// Identifier of the inventory item
    pub item_id: String,
    /// Used quantity
    pub quantity: f64,
    /// Stock left after the usage
    pub current_quantity: f64,
}

impl TypedEvent for StockUsed {
    const EVENT_TYPE: &'static str = STOCK_USED;

    fn aggregate_id(&self) -> String {
        self.item_id.clone()
    }
}

/// Payload of [`ALERT_LOW_STOCK`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// Identifier of the inventory item
    pub item_id: String,
    /// Stock left
    pub current_quantity: f64,
    /// Threshold below which the item should be reordered
    pub threshold: f64,
    /// Menu items which use this inventory item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_item_ids: Vec<String>,
}

impl TypedEvent for LowStockAlert {
    const EVENT_TYPE: &'static str = ALERT_LOW_STOCK;

    fn aggregate_id(&self) -> String {
        self.item_id.clone()
    }
}

/// Payload of [`ALERT_OUT_OF_STOCK`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfStockAlert {
    /// Identifier of the inventory item
    pub item_id: String,
    /// Menu items which use this inventory item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu_item_ids: Vec<String>,
}

impl TypedEvent for OutOfStockAlert {
    const EVENT_TYPE: &'static str = ALERT_OUT_OF_STOCK;

    fn aggregate_id(&self) -> String {
        self.item_id.clone()
    }
}
