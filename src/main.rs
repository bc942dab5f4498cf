//! speccy entry point.
//!
//! Logging goes to stderr (filtered with `RUST_LOG`) so that documents printed
//! to stdout can be piped somewhere useful.

mod cli;
mod error;
mod setup;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use serde::Serialize;
use speccy_cache::CacheBackend;
use speccy_config::Config;
use speccy_spec::models::{ApiSpec, AsyncApiSpec, Content, ODataSpec, OpenApiSpec};
use speccy_spec::{Artifact, Kind, SpecCache, SpecSource};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pause before the single retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let store = setup::store(&config)?;
    match cli.command {
        Command::Get { kind, id, no_cache } if no_cache => report(print(&store, kind, &id).await?, kind, &id),
        Command::Get { kind, id, .. } => {
            let backend = setup::cache(&config.cache).await?;
            let cache = SpecCache::new(Arc::new(store), backend.clone());
            let printed = print(&cache, kind, &id).await;
            backend.close().await;
            report(printed?, kind, &id)
        },
        Command::Watch => {
            let backend = setup::cache(&config.cache).await?;
            let cache = SpecCache::new(Arc::new(store), backend.clone());
            let stop = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(stop.clone()));
            cache.initialize(stop.clone()).await;
            tracing::info!("Watching for changes; press Ctrl-C to stop");
            stop.cancelled().await;
            drop(cache);
            backend.close().await;
            tracing::info!("Stopped watching");
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn report(found: bool, kind: Kind, id: &str) -> Result<ExitCode> {
    if found {
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("No {kind} found for {id:?}");
    Ok(ExitCode::FAILURE)
}

async fn cancel_on_ctrl_c(stop: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Unable to listen for Ctrl-C");
        return;
    }
    stop.cancel();
}

/// Print the `raw` projection of a document; `false` if it doesn't exist.
async fn print(source: &dyn SpecSource, kind: Kind, id: &str) -> Result<bool> {
    match kind {
        Kind::ApiSpec => print_json(fetch::<ApiSpec>(source, id).await?.map(|doc| doc.raw)),
        Kind::OpenApiSpec => print_json(fetch::<OpenApiSpec>(source, id).await?.map(|doc| doc.raw)),
        Kind::AsyncApiSpec => print_json(fetch::<AsyncApiSpec>(source, id).await?.map(|doc| doc.raw)),
        Kind::Content => print_json(fetch::<Content>(source, id).await?.map(|doc| doc.raw)),
        Kind::ODataSpec => Ok(match fetch::<ODataSpec>(source, id).await? {
            Some(doc) => {
                println!("{}", doc.raw.trim());
                true
            },
            None => false,
        }),
    }
}

/// Read one document, trying once more if the first failure was transient.
async fn fetch<A: Artifact>(source: &dyn SpecSource, id: &str) -> Result<Option<A>> {
    match A::from_source(source, id).await {
        Err(err) if err.is_retryable() => {
            tracing::warn!(kind = %A::KIND, id, error = ?err, "Transient failure; retrying once");
            tokio::time::sleep(RETRY_DELAY).await;
            A::from_source(source, id).await.or_raise(|| ErrorKind::Spec)
        },
        read => read.or_raise(|| ErrorKind::Spec),
    }
}

fn print_json(document: Option<impl Serialize>) -> Result<bool> {
    let Some(document) = document else {
        return Ok(false);
    };
    println!("{}", serde_json::to_string_pretty(&document).or_raise(|| ErrorKind::Output)?);
    Ok(true)
}
