//! Turns orders into kitchen tickets and tracks their preparation

mod options;
mod service;

use crate::harness::{Heart, Module, RedisCommunicationFactory, ServiceModule};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;

pub use options::Options;
pub use service::{KitchenService, KitchenTicket};

/// Module implementation
pub struct Kitchen {
    module: ServiceModule<KitchenService, RedisCommunicationFactory>,
}

impl Kitchen {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        let mut module = ServiceModule::<KitchenService, _>::new(options.redis.factory(), ())
            .with_options(options.consuming.consumer_options());

        if let Some(name) = options.consuming.consumer {
            module = module.with_consumer_name(name);
        }

        Self { module }
    }
}

#[async_trait]
impl Module for Kitchen {
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
