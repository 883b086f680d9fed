//! Serve command - run the descriptor proxy until Ctrl-C

use crate::cli::args::ServeArgs;
use crate::cli::commands::shutdown_signal;
use crate::config::{Config, ConfigManager};
use crate::descriptor::DescriptorService;
use crate::error::GemBridgeResult;
use crate::registry::FacadeRegistry;
use crate::server::DescriptorProxyServer;
use crate::ui::{self, UiContext};
use crate::upstream::UpstreamLocation;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> GemBridgeResult<()> {
    let ctx = UiContext::detect();

    let bind = args.bind.unwrap_or_else(|| config.proxy.bind.clone());
    let group = args.group.unwrap_or_else(|| config.proxy.group.clone());
    let url = args.upstream.unwrap_or_else(|| config.upstream.url.clone());
    let refresh = args.refresh_dependencies || config.proxy.refresh_dependencies;

    let location = UpstreamLocation::parse(&url)?;
    let registry = FacadeRegistry::from_config(ConfigManager::cache_root(config), &config.upstream);
    let handle = registry.get_or_create(&location)?;
    let cache_dir = registry.cache_dir_for(&location);

    let service = DescriptorService::new(handle, group.as_str(), refresh);
    let mut server = DescriptorProxyServer::new(service, bind);
    server.start().await?;
    let base_url = server.base_url()?;

    ui::intro(&ctx, "gembridge descriptor proxy");
    ui::step_ok_detail(&ctx, "Listening", &base_url);
    ui::key_value(&ctx, "upstream", location.as_str());
    ui::key_value(&ctx, "group", &group);
    ui::key_value(&ctx, "cache", &cache_dir.display().to_string());
    if config.upstream.offline {
        ui::step_warn(&ctx, "Offline: only cached gems are served");
    }
    ui::remark(
        &ctx,
        &format!(
            "Ivy pattern: {}/[organisation]/[module]/[revision]/ivy.xml",
            base_url
        ),
    );
    ui::remark(&ctx, "Press Ctrl-C to stop");

    let waited = shutdown_signal().await;
    server.stop().await;
    waited?;

    ui::outro_success(&ctx, "Stopped");
    Ok(())
}
