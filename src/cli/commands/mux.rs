//! Mux command - serve Maven-shaped release paths for several repositories

use crate::cli::args::MuxArgs;
use crate::cli::commands::shutdown_signal;
use crate::config::schema::RepositoryConfig;
use crate::config::{Config, ConfigManager};
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::server::RepositoryMultiplexer;
use crate::ui::{self, UiContext};

/// Execute the mux command
pub async fn execute(args: MuxArgs, config: &Config) -> GemBridgeResult<()> {
    let ctx = UiContext::detect();

    let repositories: Vec<RepositoryConfig> = config
        .repositories
        .iter()
        .cloned()
        .chain(args.repos.into_iter().map(RepositoryConfig::new))
        .collect();
    if repositories.is_empty() {
        return Err(GemBridgeError::User(
            "No repositories to serve; pass --repo <URL> or add [[repositories]] to the config"
                .to_string(),
        ));
    }

    let mut mux = RepositoryMultiplexer::new(
        ConfigManager::cache_root(config),
        config.upstream.clone(),
    )
    .with_bind(args.bind);

    let mut paths = Vec::new();
    for repository in repositories {
        let url = repository.url.clone();
        match mux.register(repository)? {
            Some(path) => paths.push((url, path)),
            None => ui::step_warn_hint(&ctx, &url, "listed twice, ignoring duplicate"),
        }
    }

    let addr = mux.start().await?;

    ui::intro(&ctx, "gembridge repository multiplexer");
    ui::step_ok_detail(&ctx, "Listening", &addr.to_string());
    for (url, path) in &paths {
        ui::key_value(&ctx, url, &mux.url(path)?);
    }
    ui::remark(&ctx, "Press Ctrl-C to stop");

    let waited = shutdown_signal().await;
    mux.stop().await;
    waited?;

    ui::outro_success(&ctx, "Stopped");
    Ok(())
}
