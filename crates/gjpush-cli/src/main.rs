use gjpush_core::logging;

mod cli;

use crate::cli::CliCommand;

/// Exit status for a push stopped by `gjpush cancel` or Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; stderr if the state dir is unusable.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        if cli::is_cancelled(&err) {
            tracing::info!("cancelled by user");
            std::process::exit(EXIT_CANCELLED);
        }
        eprintln!("gjpush error: {:#}", err);
        std::process::exit(1);
    }
}
