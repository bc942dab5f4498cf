use clap::{Parser, Subcommand};
use speccy_spec::Kind;
use std::path::PathBuf;

/// Serve API specifications and documentation bundles from a blob store.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON), layered over the user config file.
    #[arg(short, long, global = true, env = "SPECCY_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print one document as JSON.
    Get {
        /// api, openapi, odata, asyncapi or content.
        #[arg(value_parser = parse_kind)]
        kind: Kind,
        id: String,
        /// Read straight from the blob store, skipping the cache.
        #[arg(long)]
        no_cache: bool,
    },
    /// Keep the cache synced with change notifications until interrupted.
    Watch,
}

fn parse_kind(value: &str) -> Result<Kind, String> {
    value.parse().map_err(|e: speccy_spec::error::Error| (*e).to_string())
}
