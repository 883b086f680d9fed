//! CLI command implementations

pub mod cache;
pub mod config;
pub mod fetch;
pub mod mux;
pub mod ping;
pub mod serve;

pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use mux::execute as mux;
pub use ping::execute as ping;
pub use serve::execute as serve;

use crate::error::{GemBridgeError, GemBridgeResult};

/// Block until the user presses Ctrl-C
pub(crate) async fn shutdown_signal() -> GemBridgeResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| GemBridgeError::io("waiting for Ctrl-C", e))
}
