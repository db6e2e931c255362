//! Stream catalog and the topology of producers and consumers

use super::event::{inventory, kitchen, menu, order, reservation};
use crate::library::communication::event::{
    ConsumerGroupDescriptor, StreamDescriptor, StreamLocation,
};
use std::fmt;

/// Stream into which the menu service publishes
pub const MENU_EVENTS: &str = "menu-events";
/// Stream into which the reservation service publishes
pub const RESERVATION_EVENTS: &str = "reservation-events";
/// Stream into which the order service publishes
pub const ORDER_EVENTS: &str = "order-events";
/// Stream into which the kitchen service publishes
pub const KITCHEN_EVENTS: &str = "kitchen-events";
/// Stream into which the inventory service publishes
pub const INVENTORY_EVENTS: &str = "inventory-events";

/// Service owning a part of the restaurant domain and the stream of its events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundedContext {
    /// Menus, their items and the availability thereof
    Menu,
    /// Guest orders and their payment
    Order,
    /// Preparation of orders in the kitchen
    Kitchen,
    /// Table reservations
    Reservation,
    /// Stock of ingredients and supplies
    Inventory,
}

impl BoundedContext {
    /// Every bounded context in the restaurant
    pub const ALL: [BoundedContext; 5] = [
        BoundedContext::Menu,
        BoundedContext::Order,
        BoundedContext::Kitchen,
        BoundedContext::Reservation,
        BoundedContext::Inventory,
    ];

    /// Name of the context, equal to the first segment of its event types
    pub fn name(self) -> &'static str {
        match self {
            BoundedContext::Menu => "menu",
            BoundedContext::Order => "order",
            BoundedContext::Kitchen => "kitchen",
            BoundedContext::Reservation => "reservation",
            BoundedContext::Inventory => "inventory",
        }
    }

    /// Stream the context publishes into
    pub fn stream(self) -> &'static str {
        match self {
            BoundedContext::Menu => MENU_EVENTS,
            BoundedContext::Order => ORDER_EVENTS,
            BoundedContext::Kitchen => KITCHEN_EVENTS,
            BoundedContext::Reservation => RESERVATION_EVENTS,
            BoundedContext::Inventory => INVENTORY_EVENTS,
        }
    }

    /// Closed set of event types the context publishes
    pub fn event_types(self) -> &'static [&'static str] {
        match self {
            BoundedContext::Menu => &menu::ALL,
            BoundedContext::Order => &order::ALL,
            BoundedContext::Kitchen => &kitchen::ALL,
            BoundedContext::Reservation => &reservation::ALL,
            BoundedContext::Inventory => &inventory::ALL,
        }
    }

    /// Consumer groups attached to the stream of this context
    pub fn consumers(self) -> &'static [ConsumerBinding] {
        match self {
            BoundedContext::Order => &[KITCHEN_ORDERS],
            BoundedContext::Inventory => &[MENU_INVENTORY],
            _ => &[],
        }
    }

    /// Context which produces events of the given type, derived from the first segment of the type
    ///
    /// This also resolves types which are not part of the catalog (yet), e.g. `order.refunded`.
    pub fn of_event_type(event_type: &str) -> Option<Self> {
        let prefix = event_type.split('.').next()?;

        Self::ALL
            .iter()
            .copied()
            .find(|context| context.name() == prefix)
    }
}

impl fmt::Display for BoundedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attachment of a consuming service to a stream of another context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerBinding {
    /// Stream which is consumed
    pub stream: &'static str,
    /// Consumer group the service joins
    pub group: &'static str,
    /// Default name of the consumer within the group
    pub consumer: &'static str,
    /// Context which consumes the stream
    pub consumed_by: BoundedContext,
}

impl ConsumerBinding {
    /// Descriptor of the consumed stream
    pub fn stream_descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(self.stream)
    }

    /// Descriptor of the group, starting at the oldest retained record when created
    pub fn group_descriptor(&self) -> ConsumerGroupDescriptor {
        ConsumerGroupDescriptor::new(self.group, StreamLocation::Head)
    }
}

/// Kitchen service consuming the orders
pub const KITCHEN_ORDERS: ConsumerBinding = ConsumerBinding {
    stream: ORDER_EVENTS,
    group: "kitchen-service-group",
    consumer: "kitchen-service-consumer-1",
    consumed_by: BoundedContext::Kitchen,
};

/// Menu service consuming the inventory
pub const MENU_INVENTORY: ConsumerBinding = ConsumerBinding {
    stream: INVENTORY_EVENTS,
    group: "menu-service-group",
    consumer: "menu-service-consumer-1",
    consumed_by: BoundedContext::Menu,
};
