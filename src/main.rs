//!
//! goalmusic server binary
//! -----------------------
//! Command-line entry point for the users API. Configuration comes from
//! environment variables and flags; see `goalmusic::config` or `--help`.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use goalmusic::config::{ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if ServerConfig::wants_help(&args) {
        println!("{}", USAGE);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::from_env_and_args(&args)?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "startup", "RUST_LOG='{}'", rust_log);

    goalmusic::server::run_with_config(cfg).await
}
