// Dr. Banana - tree disease record store
// Module declarations

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod config;
pub mod observable;
pub mod state;
pub mod store;

pub use config::StoreConfig;
pub use observable::Observable;
pub use state::{ContentResolver, Disease, FileResolver, StoredImage};
pub use store::{DiseaseStore, StoreError, StoreResult};

/// Command-line entry point. Returns the process exit code.
pub fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = commands::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(commands::execute(cli)) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                log::error!("Failed to serialize output: {}", e);
                1
            }
        },
        Err(e) => {
            log::error!("{}", e.message());
            1
        }
    }
}
