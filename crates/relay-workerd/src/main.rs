use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use relay_observe::init_logger;
use relay_workerd::{Args, EXIT_FAILURE, EXIT_OK};

fn main() -> ExitCode {
    let args = Args::parse();

    // Before any thread exists, so a local timezone offset can still be detected.
    if let Err(e) = init_logger(&args.logger_config()) {
        eprintln!("relay-workerd: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(relay_workerd::run(&args.config)) {
        Ok(()) => {
            info!("worker exited cleanly");
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            error!(error = %format_args!("{e:#}"), "worker failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
