use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use sable_host::{ConsoleGateway, Host, JsonFileStore};
use sable_types::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(Path::new("config.json"))?;
    let store = Arc::new(JsonFileStore::new(config.data_dir.clone())?);
    let gateway = Arc::new(ConsoleGateway::new());

    let host = Host::new(config, store, gateway);
    host.bootstrap().await?;
    host.run().await;
    Ok(())
}
