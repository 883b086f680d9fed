//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{GemBridgeError, GemBridgeResult};

/// Ask a yes/no question; `default` when nobody can answer
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> GemBridgeResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| GemBridgeError::Internal(format!("prompt task failed: {}", e)))?
    .map_err(|e| GemBridgeError::io("reading confirmation", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_yes_approves() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Clear?", false).await.unwrap());
    }

    #[tokio::test]
    async fn non_interactive_takes_default() {
        let ctx = UiContext::non_interactive();
        assert!(confirm(&ctx, "Clear?", true).await.unwrap());
        assert!(!confirm(&ctx, "Clear?", false).await.unwrap());
    }
}
