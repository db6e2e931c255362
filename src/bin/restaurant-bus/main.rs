use anyhow::{anyhow, bail, Result};
use options::{Command, LogFormat, MainOptions};
use restaurant_bus::harness::ModuleRunner;
use restaurant_bus::module::kitchen::Kitchen;
use restaurant_bus::module::menu::Menu;
use restaurant_bus::module::tools;
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let options = init();
    let runner = ModuleRunner::new(options.shutdown_timeout);

    let termination_reason = match options.command {
        Command::Kitchen(options) => runner.run(Kitchen::new(options)).await,
        Command::Menu(options) => runner.run(Menu::new(options)).await,
        Command::Publish(options) => {
            let id = tools::publish(&options.redis.factory(), &options)
                .await
                .map_err(|e| anyhow!(e))?;

            println!("{}", id);
            return Ok(());
        }
        Command::Pending(options) => {
            let count = tools::pending(&options.redis.factory(), &options)
                .await
                .map_err(|e| anyhow!(e))?;

            println!("{}", count);
            return Ok(());
        }
    };

    if termination_reason.is_failure() {
        bail!(termination_reason);
    }

    Ok(())
}

fn init() -> MainOptions {
    let options = MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log.as_str());

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    info!("restaurant-bus {}", env!("CARGO_PKG_VERSION"));

    options
}
