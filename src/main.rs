use tracing::{error, info};
use tubeproxy::{config, server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting tubeproxy {}", env!("CARGO_PKG_VERSION"));

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!("Running in {} mode", if config.is_dev { "DEV" } else { "PROD" });
    if !config.upstream_configured() {
        info!("No upstream access: serving cached and reconstructed data only");
    }

    if let Err(e) = server::start(config).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
