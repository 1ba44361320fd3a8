/// Nexusflow: workflow automation engine
///
/// Main entry point. Loads configuration from the environment and starts
/// the HTTP server with the queue worker and scheduler running alongside.

use nexusflow::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
