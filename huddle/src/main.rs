mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use huddle_core::{
    bootstrap::{init_services, load_config},
    logging,
};

use server::HuddleServer;

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Huddle room signaling server", long_about = None)]
struct Args {
    /// Path to a YAML config file
    #[arg(long, short, env = "HUDDLE_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Huddle server starting...");
    info!("gRPC address: {}", config.grpc_address());
    if config.server.enable_gateway {
        info!("HTTP address: {}", config.http_address());
    }

    // 3. Initialize services
    let services = init_services(&config);

    // 4. Run until shutdown
    HuddleServer::new(config, services).start().await
}
