pub mod commands;
pub mod dom;
mod error;
pub mod input;
pub mod metrics;
pub mod network;
pub mod overlay;
pub mod pipeline;
pub mod runtime;
mod secure_storage;
pub mod settings;
pub mod state;
mod utils;

use tracing::{info, warn};

pub use error::AppError;
pub use pipeline::{Assistant, Command, DEBOUNCE_INTERVAL};
pub use runtime::{ContentScript, PageEvent};

pub fn init_logging() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| AppError::LoggingInit(err.to_string()))
}

/// reqwest is built on rustls; install the ring provider once per process.
pub fn init_rustls_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return;
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls CryptoProvider was already installed");
    } else {
        info!("rustls CryptoProvider initialized with ring");
    }
}
