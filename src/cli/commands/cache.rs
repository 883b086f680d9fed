//! Cache command - inspect or clear the on-disk cache

use crate::cache::{directory_usage, CacheUsage, FACADES_DIR, REPOSITORIES_DIR};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{GemBridgeError, GemBridgeResult};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// One cached upstream directory
#[derive(Debug, Serialize)]
struct CachedUpstream {
    kind: &'static str,
    name: String,
    entries: u64,
    bytes: u64,
}

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> GemBridgeResult<()> {
    let root = ConfigManager::cache_root(config);

    match args.action {
        CacheAction::Path => {
            println!("{}", root.display());
            Ok(())
        }
        CacheAction::List { format } => list(&root, format).await,
        CacheAction::Clear { yes } => clear(&root, yes).await,
    }
}

async fn list(root: &Path, format: OutputFormat) -> GemBridgeResult<()> {
    let mut upstreams = Vec::new();
    for (kind, dir) in [("facade", FACADES_DIR), ("repository", REPOSITORIES_DIR)] {
        for name in subdirectories(&root.join(dir)).await? {
            let CacheUsage { entries, bytes } = directory_usage(&root.join(dir).join(&name)).await?;
            upstreams.push(CachedUpstream {
                kind,
                name,
                entries,
                bytes,
            });
        }
    }

    match format {
        OutputFormat::Table => print_table(&upstreams),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&upstreams)?),
        OutputFormat::Plain => {
            for upstream in &upstreams {
                println!("{}/{}", upstream.kind, upstream.name);
            }
        }
    }
    Ok(())
}

fn print_table(upstreams: &[CachedUpstream]) {
    if upstreams.is_empty() {
        println!("No cached upstreams.");
        return;
    }

    println!("{:<12} {:<44} {:>8} {:>10}", "KIND", "NAME", "ENTRIES", "SIZE");
    println!("{}", "-".repeat(77));
    for upstream in upstreams {
        println!(
            "{:<12} {:<44} {:>8} {:>10}",
            upstream.kind,
            upstream.name,
            upstream.entries,
            format_bytes(upstream.bytes)
        );
    }

    let total: u64 = upstreams.iter().map(|u| u.bytes).sum();
    println!();
    println!(
        "Total: {} upstream(s), {}",
        upstreams.len(),
        style(format_bytes(total)).bold()
    );
}

async fn clear(root: &Path, yes: bool) -> GemBridgeResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    if !fs::try_exists(root)
        .await
        .map_err(|e| GemBridgeError::io(format!("checking {}", root.display()), e))?
    {
        ui::step_info(&ctx, "Cache is already empty");
        return Ok(());
    }

    let question = format!("Delete everything below {}?", root.display());
    if !ui::confirm(&ctx, &question, false).await? {
        ui::step_warn_hint(&ctx, "Cache not cleared", "Use --yes to skip the prompt");
        return Ok(());
    }

    match fs::remove_dir_all(root).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(GemBridgeError::io(format!("removing {}", root.display()), e)),
    }
    ui::step_ok_detail(&ctx, "Cache cleared", &root.display().to_string());
    Ok(())
}

/// Names of the directories directly below `dir`, sorted
async fn subdirectories(dir: &Path) -> GemBridgeResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "No cache directory");
            return Ok(Vec::new());
        }
        Err(e) => return Err(GemBridgeError::io(format!("reading {}", dir.display()), e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| GemBridgeError::io(format!("reading {}", dir.display()), e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Human-readable size, binary units
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
