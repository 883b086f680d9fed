//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gembridge - gem repositories for Ivy and Maven clients
///
/// Resolves gem repository content through a local cache and serves it as
/// Ivy descriptors or Maven-shaped release paths.
#[derive(Parser, Debug)]
#[command(name = "gembridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GEMBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve from the cache only, never contact upstream
    #[arg(long, global = true)]
    pub offline: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve gems as Ivy descriptors over HTTP
    Serve(ServeArgs),

    /// Serve Maven-shaped release paths for several gem repositories
    Mux(MuxArgs),

    /// Resolve mavengem locators and write their content
    Fetch(FetchArgs),

    /// Check that an upstream answers through the translator
    Ping(PingArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Inspect or clear the local cache
    Cache(CacheArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address (default from config; port 0 picks a free port)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Organisation under which gems are exposed
    #[arg(short, long)]
    pub group: Option<String>,

    /// Gem repository to serve (default from config)
    #[arg(short, long)]
    pub upstream: Option<String>,

    /// Re-render descriptors instead of serving cached ones
    #[arg(long)]
    pub refresh_dependencies: bool,
}

/// Arguments for the mux command
#[derive(Parser, Debug)]
pub struct MuxArgs {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:0")]
    pub bind: String,

    /// Gem repository to expose (repeatable; added to [[repositories]])
    #[arg(short, long = "repo", value_name = "URL")]
    pub repos: Vec<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Locators, e.g.
    /// mavengem:https://rubygems.org/maven/releases/rubygems/rake/13.0.6/rake-13.0.6.gem
    #[arg(required = true)]
    pub locators: Vec<String>,

    /// Directory to write files into (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Give up after this many seconds, overriding the retry budget
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the ping command
#[derive(Parser, Debug)]
pub struct PingArgs {
    /// Gem repository to check (default from config)
    #[arg(short, long)]
    pub upstream: Option<String>,

    /// Also fetch /info/rake from the upstream to prove connectivity
    #[arg(long)]
    pub live: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache root
    Path,

    /// List cached upstreams with their size
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete everything below the cache root
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::parse_from([
            "gembridge",
            "serve",
            "--bind",
            "127.0.0.1:8080",
            "--group",
            "gems",
            "--refresh-dependencies",
        ]);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(args.group.as_deref(), Some("gems"));
        assert!(args.upstream.is_none());
        assert!(args.refresh_dependencies);
    }

    #[test]
    fn parse_mux_repeated_repos() {
        let cli = Cli::parse_from([
            "gembridge",
            "mux",
            "--repo",
            "https://rubygems.org",
            "-r",
            "https://gems.example.org",
        ]);
        let Commands::Mux(args) = cli.command else {
            panic!("expected mux");
        };
        assert_eq!(args.bind, "127.0.0.1:0");
        assert_eq!(args.repos.len(), 2);
    }

    #[test]
    fn fetch_requires_a_locator() {
        assert!(Cli::try_parse_from(["gembridge", "fetch"]).is_err());

        let cli = Cli::parse_from(["gembridge", "fetch", "mavengem:x", "-o", "out"]);
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.locators, vec!["mavengem:x"]);
        assert_eq!(args.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gembridge", "ping", "--live", "-vv", "--offline"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.offline);
        assert!(matches!(cli.command, Commands::Ping(PingArgs { live: true, .. })));
    }

    #[test]
    fn cache_list_format() {
        let cli = Cli::parse_from(["gembridge", "cache", "list", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheArgs {
                action: CacheAction::List {
                    format: OutputFormat::Json
                }
            })
        ));
    }

    #[test]
    fn config_without_action_defaults_to_none() {
        let cli = Cli::parse_from(["gembridge", "config"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs { action: None })
        ));
    }
}
