//! Ping command - self-test of the translator against one upstream

use crate::cli::args::PingArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::registry::FacadeRegistry;
use crate::translator::{Locator, ProtocolTranslator, RetryPolicy};
use crate::ui::{self, UiContext};
use crate::upstream::UpstreamLocation;
use std::sync::Arc;

/// Gem whose metadata is fetched by `--live`
const LIVE_CHECK_PATH: &str = "/info/rake";

/// Execute the ping command
pub async fn execute(args: PingArgs, config: &Config) -> GemBridgeResult<()> {
    let ctx = UiContext::detect();

    let url = args.upstream.unwrap_or_else(|| config.upstream.url.clone());
    let location = UpstreamLocation::parse(&url)?;
    let registry = FacadeRegistry::from_config(ConfigManager::cache_root(config), &config.upstream);
    let translator = ProtocolTranslator::new(Arc::new(registry), RetryPolicy::from(&config.retry));

    translator.self_test(&location).await?;
    ui::step_ok_detail(&ctx, "ping answered pong", location.as_str());

    if args.live {
        let connection = translator.connect(Locator::new(&location, LIVE_CHECK_PATH));
        let payload = connection.input_stream().await?;
        let size = payload.size;
        payload
            .into_bytes()
            .await
            .map_err(|e| GemBridgeError::io(format!("reading {}", LIVE_CHECK_PATH), e))?;
        ui::step_ok_detail(
            &ctx,
            &format!("fetched {}", LIVE_CHECK_PATH),
            &format!("{} bytes", size),
        );
    }

    Ok(())
}
