use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use heap_intel::app::App;
use heap_intel::config::PanelConfig;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "heap_intel=info".into()),
        )
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Config path from the first argument, else the platform default.
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(PanelConfig::default_path);
    let config = match path {
        Some(path) => PanelConfig::load_or_default(&path)?,
        None => PanelConfig::default(),
    };

    App::new(config).run().await
}
