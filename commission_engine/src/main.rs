//! Entry point for the Commission Engine binary.
//!
//! Running this binary starts an HTTP server exposing the commission
//! reports.  Configuration is read from the environment; see
//! [`commission_engine::config`].  Log verbosity follows `RUST_LOG`.

use commission_engine::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "commission_engine=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {err:#}");
            std::process::exit(1);
        }
    };
    if let Err(err) = commission_engine::api::serve(config).await {
        tracing::error!("Error running server: {err:#}");
        std::process::exit(1);
    }
}
