use restaurant_bus::library::helpers::parse_seconds;
use restaurant_bus::module::{kitchen, menu, tools};
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(about = "Event distribution backbone of the restaurant services.")]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info,redis=warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Format of the log output
    ///
    /// Formats: text, compact, json
    #[structopt(long, global = true, default_value = "text", env = "LOG_FORMAT", value_name = "format")]
    pub log_format: LogFormat,

    /// Seconds a module may take to wind down before the process exits forcefully
    #[structopt(long, global = true, default_value = "30", env = "SHUTDOWN_TIMEOUT", parse(try_from_str = parse_seconds), value_name = "seconds")]
    pub shutdown_timeout: Duration,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Turns orders into kitchen tickets
    Kitchen(kitchen::Options),
    /// Keeps the menu in line with the inventory
    Menu(menu::Options),
    /// Publishes a single event and prints its message id
    Publish(tools::PublishOptions),
    /// Prints the number of unacknowledged entries of a consumer group
    Pending(tools::PendingOptions),
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}
