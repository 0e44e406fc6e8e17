//! ipgeocache - Client IP Geolocation Endpoint
//!
//! Answers "where is this caller?" with a rounded latitude/longitude, backed by
//! the IP-API service and a day-partitioned disk cache that keeps entries for a
//! week.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::*;
use ipgeocache::cache;
use ipgeocache::server::{self, AppState};
use ipgeocache::{canonical_key, AccessGate, Config, FsStore, GeoService, IpApiResolver};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI arguments for ipgeocache.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Client IP geolocation endpoint with a day-partitioned cache",
    long_about = "ipgeocache serves the approximate latitude/longitude of the calling client, \
                  caching upstream answers on disk for up to a week.\n\n\
                  Settings come from GEOLOC_* environment variables; flags override them."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Cache root directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoint (default)
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Print the cache key for an address or forwarding chain
    Key {
        address: String,
    },
    /// Remove expired day-directories from the cache
    Prune,
}

fn open_store(config: &Config) -> FsStore {
    let store = FsStore::new(&config.cache_dir);
    match &config.cache_owner {
        Some(owner) => store.with_owner(owner),
        None => store,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();

    let mut config = Config::new().context("Failed to load configuration")?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Key { address } => {
            let key = canonical_key(&address).context("Cannot derive a cache key")?;
            println!("{}", key);
        }
        Command::Prune => {
            let store = open_store(&config);
            let today = Local::now().date_naive();
            let removed = cache::prune(&store, today, config.retention_days)
                .context("Failed to prune cache")?;
            if removed.is_empty() {
                println!("{}", "Nothing to prune.".dimmed());
            } else {
                for day in &removed {
                    println!("{} {}", "removed".yellow(), day);
                }
            }
        }
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            println!(
                "{}\n{}\n",
                "ipgeocache - Client IP Geolocation".bold().green(),
                format!("cache: {}  upstream: {}", config.cache_dir.display(), config.upstream_url).dimmed()
            );

            let resolver = IpApiResolver::new(&config.upstream_url, config.upstream_timeout)
                .context("Failed to create upstream client")?;
            let service = GeoService::new(
                Arc::new(open_store(&config)),
                Arc::new(resolver),
                AccessGate::new(config.ua_markers.clone()),
                config.cache_policy(),
            );
            let state = AppState {
                service: Arc::new(service),
                forwarded_header: config.forwarded_header.clone(),
            };
            server::serve(config.bind, state).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["ipgeocache"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["ipgeocache", "serve", "--bind", "0.0.0.0:9000", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::Serve { bind: Some(_) })));

        let cli = Cli::try_parse_from(["ipgeocache", "key", "::1"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Key { ref address }) if address == "::1"));

        let cli = Cli::try_parse_from(["ipgeocache", "prune", "--cache-dir", "/tmp/c"]).unwrap();
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
        assert!(Cli::try_parse_from(["ipgeocache", "serve", "--bind", "nowhere"]).is_err());
    }
}
