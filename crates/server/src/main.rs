#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use aunsorm_ca::{init_tracing, serve, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _telemetry = init_tracing()?;
    let config = ServerConfig::from_env()?;
    serve(config).await?;
    Ok(())
}
