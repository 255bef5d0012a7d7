//! courtsync - diagnostic CLI for the sync layer
//!
//! Issues requests through the cached client, purges cache tags and tails the
//! realtime channel using the same configuration an application would.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use courtsync::cache::{SqliteStore, SqliteStoreConfig};
use courtsync::config::SyncConfig;
use courtsync::events::SyncEvent;
use courtsync::http::RequestOptions;
use courtsync::realtime::RealtimeMessage;
use courtsync::SyncContext;
use regex::Regex;
use serde_json::Value;
use std::process;

/// courtsync - cached API client and realtime listener
#[derive(Parser, Debug)]
#[command(name = "courtsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/courtsync/config.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for authenticated calls
    #[arg(long, env = "COURTSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Refresh token sent to the refresh endpoint
    #[arg(long, env = "COURTSYNC_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// GET a path through the cache
    Get {
        /// API path, e.g. /tournaments/5
        path: String,

        /// Query parameter as name=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Bypass the cache
        #[arg(long)]
        no_cache: bool,

        /// Cache TTL in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// POST a JSON body and purge the cache tags the path touches
    Post {
        path: String,

        /// JSON body
        #[arg(default_value = "{}")]
        body: String,
    },

    /// Purge cached entries
    Invalidate {
        /// Entity tag, e.g. tournament
        #[arg(required_unless_present_any = ["pattern", "regex"])]
        entity: Option<String>,

        /// Raw substring pattern
        #[arg(long, conflicts_with_all = ["entity", "regex"])]
        pattern: Option<String>,

        /// Regular expression over cache keys
        #[arg(long, conflicts_with_all = ["entity", "pattern"])]
        regex: Option<String>,
    },

    /// Connect to the realtime channel and print incoming messages
    Listen {
        /// User id sent in the handshake
        #[arg(short, long)]
        user: String,

        /// Message types to print (default: all system messages plus these)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Persistent cache maintenance
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Check the configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Remove every entry from both tiers
    Clear,

    /// Show row counts for the persistent tier
    Stats,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

fn main() {
    if let Err(e) = courtsync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match cli.config {
        Some(ref path) => {
            SyncConfig::load(path).with_context(|| format!("Failed to load config from {}", path))?
        }
        None if !SyncConfig::default_path().exists() => {
            tracing::info!("No config file found, using defaults");
            SyncConfig::default()
        }
        None => SyncConfig::load_default().context("Failed to load default config")?,
    };
    if let Some(ref base_url) = cli.base_url {
        config.api.base_url = base_url.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Validate => {
            courtsync::config::validate_config_result(&config)?;
            println!("Configuration OK");
            return Ok(());
        }
        Commands::Cache(CacheCommands::Stats) => return print_stats(&config),
        _ => {}
    }

    let ctx = SyncContext::new(config)?;
    if let Some(ref token) = cli.token {
        ctx.credentials()
            .set_tokens(token.clone(), cli.refresh_token.clone());
    }

    match cli.command {
        Commands::Get {
            ref path,
            ref params,
            no_cache,
            ttl,
        } => {
            let mut options = RequestOptions::new();
            options.params = params.clone();
            if no_cache {
                options = options.skip_cache();
            }
            if let Some(ttl) = ttl {
                options = options.cache_ttl(std::time::Duration::from_secs(ttl));
            }
            let value: Value = ctx.client().get(path, options).await?;
            print_json(&value)?;
        }

        Commands::Post { ref path, ref body } => {
            let body: Value = serde_json::from_str(body).context("Body is not valid JSON")?;
            let value: Value = ctx.client().post(path, &body).await?;
            print_json(&value)?;
        }

        Commands::Invalidate {
            ref entity,
            ref pattern,
            ref regex,
        } => {
            let removed = match (entity, pattern, regex) {
                (Some(tag), _, _) => ctx.invalidate_by_entity(tag),
                (_, Some(pattern), _) => ctx.cache().invalidate(pattern),
                (_, _, Some(expr)) => {
                    let re = Regex::new(expr).with_context(|| format!("Invalid regex '{}'", expr))?;
                    ctx.cache().invalidate_regex(&re)
                }
                _ => bail!("Nothing to invalidate"),
            };
            println!("Removed {} cache entries", removed);
        }

        Commands::Listen {
            ref user,
            ref types,
        } => listen(&ctx, user, types).await?,

        Commands::Cache(CacheCommands::Clear) => {
            ctx.cache().clear();
            println!("Cache cleared");
        }

        Commands::Cache(CacheCommands::Stats) | Commands::Validate => {}
    }

    Ok(())
}

async fn listen(ctx: &SyncContext, user: &str, types: &[String]) -> anyhow::Result<()> {
    let token = match ctx.credentials().access_token() {
        Some(token) => token,
        None => bail!("A token is required to listen (use --token or COURTSYNC_TOKEN)"),
    };

    let channel = ctx.channel();
    for message_type in types
        .iter()
        .map(String::as_str)
        .chain([courtsync::realtime::SYSTEM_MESSAGE])
    {
        channel.subscribe(message_type, print_message);
    }

    let mut events = ctx.subscribe_events();
    channel.connect(user, &token).await?;
    println!("Connected to {}", channel.endpoint());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                channel.disconnect().await;
                println!("Disconnected");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(SyncEvent::ConnectionLost { attempts }) => {
                    bail!("Connection lost after {} reconnect attempts", attempts);
                }
                Ok(SyncEvent::ForcedLogout) => {
                    println!("Server forced logout");
                    return Ok(());
                }
                Ok(SyncEvent::StateChanged(state)) => println!("[state] {}", state),
                Ok(other) => println!("[event] {:?}", other),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn print_message(message: &RealtimeMessage) {
    println!(
        "[{}] {} {}",
        message.timestamp.format("%H:%M:%S"),
        message.kind,
        message.payload
    );
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stats(config: &SyncConfig) -> anyhow::Result<()> {
    if !config.cache.persistent {
        println!("Persistent cache is disabled");
        return Ok(());
    }
    let path = &config.cache.path;
    if !path.exists() {
        println!("No persistent cache at {}", path.display());
        return Ok(());
    }

    let store = SqliteStore::open(SqliteStoreConfig::new(path))
        .with_context(|| format!("Failed to open cache at {}", path.display()))?;
    let counts = store.entry_counts()?;
    println!("Database:  {}", path.display());
    println!("Entries:   {} (memory tier holds at most {})", counts.total, config.cache.max_size);
    println!("Live:      {}", counts.live);
    println!("Expired:   {}", counts.total - counts.live - counts.corrupt);
    println!("Corrupt:   {}", counts.corrupt);
    Ok(())
}
