use std::process::ExitCode;

use tile_engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app.config, app.runtime) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    info!("shutdown_complete");
    ExitCode::SUCCESS
}
