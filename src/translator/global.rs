//! Process-wide translator for callers that cannot be handed one.
//!
//! Prefer passing a `ProtocolTranslator` around. This shim only exists for
//! code paths that look locators up by scheme without any context.

use super::{GemConnection, ProtocolTranslator};
use crate::error::{GemBridgeError, GemBridgeResult};
use std::sync::{Arc, OnceLock};

static INSTALLED: OnceLock<Arc<ProtocolTranslator>> = OnceLock::new();

/// Install `translator` for the rest of the process. Only the first call wins.
pub fn install(translator: Arc<ProtocolTranslator>) -> GemBridgeResult<()> {
    INSTALLED
        .set(translator)
        .map_err(|_| GemBridgeError::Internal("a translator is already installed".to_string()))
}

/// The installed translator, if any
pub fn installed() -> Option<Arc<ProtocolTranslator>> {
    INSTALLED.get().cloned()
}

/// Open `locator` with the installed translator
pub fn open(locator: &str) -> GemBridgeResult<GemConnection> {
    INSTALLED
        .get()
        .ok_or_else(|| GemBridgeError::Internal("no translator installed".to_string()))?
        .open(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FacadeRegistry;
    use crate::translator::RetryPolicy;
    use crate::upstream::OfflineUpstream;
    use tempfile::TempDir;

    // The only test in the crate touching the global slot
    #[tokio::test]
    async fn install_once_then_open() {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(FacadeRegistry::new(temp.path(), Arc::new(OfflineUpstream)));
        let translator = Arc::new(ProtocolTranslator::new(registry, RetryPolicy::default()));

        install(translator.clone()).unwrap();
        assert!(install(translator).is_err());
        assert!(installed().is_some());

        let payload = open("mavengem:https://rubygems.org/maven/releases/ping")
            .unwrap()
            .input_stream()
            .await
            .unwrap();
        assert_eq!(payload.into_bytes().await.unwrap(), b"pong");
        assert!(open("not a locator").is_err());
    }
}
