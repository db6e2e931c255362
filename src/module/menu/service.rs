use crate::domain::event::inventory::{self, LowStockAlert, OutOfStockAlert, StockReceived};
use crate::domain::event::menu::MenuItemAvailabilityChanged;
use crate::domain::event::EventPayload;
use crate::domain::stream::{ConsumerBinding, MENU_EVENTS, MENU_INVENTORY};
use crate::harness::Service;
use crate::library::communication::event::{
    EventEnvelope, EventHandler, EventPublisher, HandlerContext, Subscription,
};
use crate::library::EmptyResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Static knowledge about which menu items depend on which inventory items
#[derive(Debug, Clone, Default)]
pub struct MenuConfig {
    links: BTreeMap<String, BTreeSet<String>>,
}

impl MenuConfig {
    /// Marks the menu item as requiring the inventory item
    pub fn with_link(mut self, inventory_item: impl Into<String>, menu_item: impl Into<String>) -> Self {
        self.links
            .entry(inventory_item.into())
            .or_default()
            .insert(menu_item.into());
        self
    }

    /// Menu items requiring the given inventory item, in lexical order
    pub fn menu_items_of(&self, inventory_item: &str) -> Vec<&str> {
        self.links
            .get(inventory_item)
            .map(|items| items.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Takes menu items off the menu when an ingredient runs out and back on once it has been restocked
///
/// Consumes:
/// - [`OutOfStockAlert`]
/// - [`LowStockAlert`]
/// - [`StockReceived`]
///
/// Publishes:
/// - [`MenuItemAvailabilityChanged`]
///
/// Menu items are considered available until an alert says otherwise. A change is only published
/// when it actually flips the availability, which makes redeliveries harmless.
pub struct MenuService {
    publisher: Arc<dyn EventPublisher>,
    config: MenuConfig,
    availability: Mutex<HashMap<String, bool>>,
}

impl Service for MenuService {
    const NAME: &'static str = "MenuService";
    const PUBLISHES: &'static str = MENU_EVENTS;
    const BINDING: ConsumerBinding = MENU_INVENTORY;

    type Config = MenuConfig;

    fn instantiate(publisher: Arc<dyn EventPublisher>, config: &Self::Config) -> Self {
        Self {
            publisher,
            config: config.clone(),
            availability: Mutex::new(HashMap::new()),
        }
    }

    fn subscriptions(service: Arc<Self>) -> Vec<Subscription> {
        vec![Subscription::shared(
            &[
                inventory::ALERT_OUT_OF_STOCK,
                inventory::ALERT_LOW_STOCK,
                inventory::STOCK_RECEIVED,
            ],
            service,
        )]
    }
}

impl MenuService {
    /// Whether guests may currently order the menu item
    pub async fn is_available(&self, menu_item_id: &str) -> bool {
        self.availability
            .lock()
            .await
            .get(menu_item_id)
            .copied()
            .unwrap_or(true)
    }

    fn affected_menu_items(&self, inventory_item: &str, named: &[String]) -> BTreeSet<String> {
        self.config
            .menu_items_of(inventory_item)
            .into_iter()
            .map(str::to_owned)
            .chain(named.iter().cloned())
            .collect()
    }

    async fn change_availability(
        &self,
        cause: &EventEnvelope,
        menu_items: BTreeSet<String>,
        available: bool,
        reason: String,
    ) -> EmptyResult {
        let mut availability = self.availability.lock().await;

        for menu_item_id in menu_items {
            if availability.get(&menu_item_id).copied().unwrap_or(true) == available {
                continue;
            }

            let event = MenuItemAvailabilityChanged {
                menu_item_id: menu_item_id.clone(),
                available,
                reason: Some(reason.clone()),
            };

            let envelope = EventEnvelope::from_event(&event)?.caused_by(cause);
            self.publisher.publish(&envelope).await?;

            info!(menu_item_id = menu_item_id.as_str(), available, "Availability changed");
            availability.insert(menu_item_id, available);
        }

        Ok(())
    }

    async fn out_of_stock(&self, cause: &EventEnvelope, alert: OutOfStockAlert) -> EmptyResult {
        let menu_items = self.affected_menu_items(&alert.item_id, &alert.menu_item_ids);
        let reason = format!("{} is out of stock", alert.item_id);

        self.change_availability(cause, menu_items, false, reason).await
    }

    fn low_stock(&self, alert: LowStockAlert) -> EmptyResult {
        warn!(
            item_id = alert.item_id.as_str(),
            current_quantity = alert.current_quantity,
            threshold = alert.threshold,
            menu_items = ?self.affected_menu_items(&alert.item_id, &alert.menu_item_ids),
            "Ingredient is running low"
        );

        Ok(())
    }

    async fn stock_received(&self, cause: &EventEnvelope, stock: StockReceived) -> EmptyResult {
        if stock.quantity <= 0.0 || stock.current_quantity <= 0.0 {
            debug!(
                item_id = stock.item_id.as_str(),
                quantity = stock.quantity,
                current_quantity = stock.current_quantity,
                "Received stock does not suffice"
            );
            return Ok(());
        }

        let menu_items = self.affected_menu_items(&stock.item_id, &stock.menu_item_ids);
        let reason = format!("{} has been restocked", stock.item_id);

        self.change_availability(cause, menu_items, true, reason).await
    }
}

#[async_trait]
impl EventHandler for MenuService {
    async fn handle(&self, _context: &HandlerContext, envelope: &EventEnvelope) -> EmptyResult {
        match EventPayload::decode(envelope)? {
            EventPayload::OutOfStock(alert) => self.out_of_stock(envelope, alert).await,
            EventPayload::LowStock(alert) => self.low_stock(alert),
            EventPayload::StockReceived(stock) => self.stock_received(envelope, stock).await,
            other => {
                debug!(event_type = other.event_type(), "Event is of no interest to the menu");
                Ok(())
            }
        }
    }
}
