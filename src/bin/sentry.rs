//! Binary entry point. Loads `.env`, initializes logging, loads configuration
//! from the environment, and runs the orchestrator until a shutdown signal
//! (spec §4.12, §6).

use swap_sentry::config::{Config, Roles};
use swap_sentry::orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let roles = Roles::from_args(std::env::args().skip(1));
    let config = Config::from_env();

    log::info!("📘 starting swap sentry (ingest={} consume={} detect={})", roles.ingest, roles.consume, roles.detect);

    let orchestrator = match Orchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            log::error!("❌ failed to initialize orchestrator: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = orchestrator.run(roles).await {
        log::error!("❌ orchestrator exited with error: {e}");
        std::process::exit(1);
    }
}
