use crate::module::options::{ConsumingOptions, RedisOptions};
use structopt::StructOpt;

/// Options for the kitchen module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub consuming: ConsumingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,
}
