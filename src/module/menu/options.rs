use super::service::MenuConfig;
use crate::library::helpers::split_into_two;
use crate::module::options::{ConsumingOptions, RedisOptions};
use structopt::StructOpt;

/// Options for the menu module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub consuming: ConsumingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    /// Links an inventory item to a menu item that can not be served without it.
    /// Inventory alerts may additionally name the affected menu items themselves.
    #[structopt(long = "link", parse(try_from_str = parse_link), number_of_values = 1, value_name = "inventory-item=menu-item")]
    pub links: Vec<(String, String)>,
}

impl Options {
    /// Configuration of the menu service
    pub fn config(&self) -> MenuConfig {
        self.links
            .iter()
            .fold(MenuConfig::default(), |config, (inventory_item, menu_item)| {
                config.with_link(inventory_item, menu_item)
            })
    }
}

fn parse_link(src: &str) -> Result<(String, String), String> {
    match split_into_two(src, "=") {
        Some((inventory_item, menu_item)) if !inventory_item.is_empty() && !menu_item.is_empty() => {
            Ok((inventory_item, menu_item))
        }
        _ => Err(format!("expected <inventory-item>=<menu-item> but got '{}'", src)),
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collect_ingredient_links() {
        let options = Options::from_iter_safe(&[
            "menu",
            "--link",
            "flour=pizza",
            "--link",
            "flour=bread",
            "--link",
            "basil=pizza",
        ])
        .unwrap();

        let config = options.config();
        assert_eq!(config.menu_items_of("flour"), vec!["bread", "pizza"]);
        assert_eq!(config.menu_items_of("basil"), vec!["pizza"]);
        assert!(config.menu_items_of("salt").is_empty());
    }

    #[test]
    fn reject_malformed_links() {
        assert!(Options::from_iter_safe(&["menu", "--link", "flour"]).is_err());
        assert!(Options::from_iter_safe(&["menu", "--link", "=pizza"]).is_err());
    }
}
