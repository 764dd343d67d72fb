//! Millwright CLI
//!
//! Usage:
//!   millwright start                     # launch and monitor the pipeline
//!   millwright start --force             # displace a running millwright
//!   millwright start -p pipeline.yaml    # use a pipeline file
//!   millwright validate                  # check the pipeline, print launch order
//!   millwright inspect <name>            # print a component's published variables
//!   millwright kill <name>               # force-remove a component's container
//!   millwright destroy                   # remove every millwright resource
//!   millwright destroy -p pipeline.yaml  # use the label of a pipeline file

use millwright::cli::Command;
use millwright::{commands, MillwrightArgs};

#[tokio::main]
async fn main() {
    let args: MillwrightArgs = argh::from_env();

    // Initialize logging
    let env = env_logger::Env::default().default_filter_or(args.log_filter());
    env_logger::init_from_env(env);

    let result = match args.command {
        Command::Start(start) => commands::start(start).await,
        Command::Validate(validate) => commands::validate(validate),
        Command::Destroy(destroy) => commands::destroy(destroy).await,
        Command::Kill(kill) => commands::kill(kill).await,
        Command::Inspect(inspect) => commands::inspect(inspect).await,
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
