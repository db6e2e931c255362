//! Keeps the availability of menu items in line with the inventory

mod options;
mod service;

use crate::harness::{Heart, Module, RedisCommunicationFactory, ServiceModule};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;

pub use options::Options;
pub use service::{MenuConfig, MenuService};

/// Module implementation
pub struct Menu {
    module: ServiceModule<MenuService, RedisCommunicationFactory>,
}

impl Menu {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        let mut module = ServiceModule::<MenuService, _>::new(options.redis.factory(), options.config())
            .with_options(options.consuming.consumer_options());

        if let Some(name) = options.consuming.consumer {
            module = module.with_consumer_name(name);
        }

        Self { module }
    }
}

#[async_trait]
impl Module for Menu {
    async fn pre_startup(&mut self) -> EmptyResult {
        self.module.pre_startup().await
    }

    async fn run(&mut self) -> Result<Option<Heart>, BoxedError> {
        self.module.run().await
    }

    async fn shutdown(&mut self) {
        self.module.shutdown().await
    }
}
