//! Fetch command - open locators through the protocol translator

use crate::cli::args::FetchArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::registry::FacadeRegistry;
use crate::translator::ProtocolTranslator;
use crate::ui::{self, UiContext};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> GemBridgeResult<()> {
    let ctx = UiContext::detect();
    let registry = FacadeRegistry::from_config(ConfigManager::cache_root(config), &config.upstream);
    let translator = ProtocolTranslator::new(Arc::new(registry), (&config.retry).into());

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| GemBridgeError::io(format!("creating {}", dir.display()), e))?;
    }

    // Ctrl-C cuts retry waits short
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let deadline = args
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let fetches = args.locators.iter().map(|locator| {
        fetch_one(
            &translator,
            locator,
            args.output.as_deref(),
            cancel.clone(),
            deadline,
        )
    });
    let results = join_all(fetches).await;
    watcher.abort();

    let mut first_error = None;
    for (locator, result) in args.locators.iter().zip(results) {
        match result {
            Ok(Some(path)) => ui::step_ok_detail(&ctx, locator, &path.display().to_string()),
            Ok(None) => {}
            Err(e) => {
                warn!(%locator, error = %e, "Fetch failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Resolve one locator; returns the written file when writing to a directory
async fn fetch_one(
    translator: &ProtocolTranslator,
    locator: &str,
    output: Option<&Path>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
) -> GemBridgeResult<Option<PathBuf>> {
    let mut connection = translator.open(locator)?.with_cancellation(cancel);
    if let Some(deadline) = deadline {
        connection = connection.with_deadline(deadline);
    }

    let mut payload = connection.input_stream().await?;
    let Some(dir) = output else {
        let bytes = payload
            .into_bytes()
            .await
            .map_err(|e| GemBridgeError::io(format!("reading {}", locator), e))?;
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(&bytes)
            .await
            .map_err(|e| GemBridgeError::io("writing to stdout", e))?;
        stdout
            .flush()
            .await
            .map_err(|e| GemBridgeError::io("writing to stdout", e))?;
        return Ok(None);
    };

    let target = dir.join(file_name(connection.locator().relative()));
    let mut file = fs::File::create(&target)
        .await
        .map_err(|e| GemBridgeError::io(format!("creating {}", target.display()), e))?;
    tokio::io::copy(&mut payload.source, &mut file)
        .await
        .map_err(|e| GemBridgeError::io(format!("writing {}", target.display()), e))?;
    file.flush()
        .await
        .map_err(|e| GemBridgeError::io(format!("writing {}", target.display()), e))?;

    Ok(Some(target))
}

/// Last path segment, used as the output file name
fn file_name(relative: &str) -> &str {
    relative
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("/rubygems/rake/13.0.6/rake-13.0.6.gem"), "rake-13.0.6.gem");
        assert_eq!(file_name("/ping"), "ping");
        assert_eq!(file_name("/rubygems/rake/"), "rake");
        assert_eq!(file_name("/"), "index");
    }
}
