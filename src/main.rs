//! Runs the stub records and verification services for local development.
//!
//! # Environment Variables
//! - `ODC_STUB_ADDR`: listen address (default: "127.0.0.1:4000")
//! - `ODC_STUB_TOKEN`: bearer token the stub accepts (default: "dev-token")

use odc_stub::{StubConfig, StubState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("odc_run=info".parse()?)
                .add_directive("odc_stub=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StubConfig::from_env_values(
        std::env::var("ODC_STUB_ADDR").ok(),
        std::env::var("ODC_STUB_TOKEN").ok(),
    )?;

    tracing::info!("++ Starting ODC stub services on {}", config.addr());

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    let state = StubState::new(&config);

    tokio::select! {
        result = odc_stub::serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("-- Stopping ODC stub services"),
    }

    Ok(())
}
