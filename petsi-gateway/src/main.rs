//! PETSI Gateway - Main entry point.

use anyhow::Result;
use petsi_common::config::Config;
use petsi_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging(&config.observability.log_level, &config.observability.log_format);

    tracing::info!("PETSI Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Start the gateway server
    petsi_gateway::start_server(&config).await
}
