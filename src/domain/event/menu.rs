//! Events published by the menu service into `menu-events`

use crate::library::communication::event::TypedEvent;
use serde::{Deserialize, Serialize};

/// Menu has been created
pub const CREATED: &str = "menu.created";
/// Menu has been put into service
pub const ACTIVATED: &str = "menu.activated";
/// Menu has been taken out of service
pub const DEACTIVATED: &str = "menu.deactivated";
/// Item has been added to a menu
pub const ITEM_ADDED: &str = "menu.item.added";
/// Item of a menu has been changed
pub const ITEM_UPDATED: &str = "menu.item.updated";
/// Item has been removed from a menu
pub const ITEM_REMOVED: &str = "menu.item.removed";
/// Item became orderable or stopped being orderable
pub const ITEM_AVAILABILITY_CHANGED: &str = "menu.item.availability.changed";

/// Every event type of the menu context
pub const ALL: [&str; 7] = [
    CREATED,
    ACTIVATED,
    DEACTIVATED,
    ITEM_ADDED,
    ITEM_UPDATED,
    ITEM_REMOVED,
    ITEM_AVAILABILITY_CHANGED,
];

/// Payload of [`ITEM_AVAILABILITY_CHANGED`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemAvailabilityChanged {
    /// Identifier of the menu item
    pub menu_item_id: String,
    /// Whether guests may order the item
    pub available: bool,
    /// Why the availability changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TypedEvent for MenuItemAvailabilityChanged {
    const EVENT_TYPE: &'static str = ITEM_AVAILABILITY_CHANGED;

    fn aggregate_id(&self) -> String {
        self.menu_item_id.clone()
    }
}
