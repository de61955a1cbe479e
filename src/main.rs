// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Resolve IANA/Olson timezone names to Linux `TZ` strings.
//!
//! The mapping comes from a flat file fetched over HTTP and cached in two tiers: the resolver's
//! memory and an optional persistent key-value store. See [`resolver`] for the load order and
//! [`environment`] for configuration.

mod cache;
mod environment;
mod error;
mod generate;
mod http;
mod minimal_tracer;
mod net;
mod resolver;
mod server;
mod table;
mod tz_shape;
mod tzif;

use std::{error::Error, path::Path, process::ExitCode, sync::Arc, time::Instant};

use minimal_tracer::MinimalTracer;
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, trace};

use crate::{
    cache::{CacheStore, FileKv, KvStore, MemoryKv, RemoteKv},
    environment::{Config, KvBackend},
    http::Fetcher,
    net::HyperClient,
    resolver::{Lookup, TimezoneResolver},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = MinimalTracer::register() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    trace!("Started tzresolve");

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        None | Some("serve") => start_server().await,
        Some("lookup") => match args.get(2) {
            Some(zone) => lookup(zone).await,
            None => Err("lookup: a timezone name is required.".into()),
        },
        Some("generate") => match args.get(2) {
            Some(dir) => generate_table(Path::new(dir), args.get(3).map(String::as_str)).await,
            None => Err("generate: a zoneinfo directory is required.".into()),
        },
        Some("-v" | "--version") => {
            print_version();
            Ok(())
        },
        Some("-h" | "--help") => {
            usage();
            Ok(())
        },
        Some(arg) => {
            eprintln!("Unknown command: {}", arg);
            usage();
            return ExitCode::FAILURE;
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        },
    }
}

fn print_version() {
    println!("tzresolve {}", VERSION);
}

fn usage() {
    print_version();
    println!(
        r#"

Usage:
  tzresolve [serve]
  tzresolve lookup <timezone>
  tzresolve generate <zoneinfo-dir> [<version>]
  tzresolve -v | --version
  tzresolve -h | --help

Commands:
  serve             Run the HTTP server (default). Every request is answered with
                      the Linux TZ string for the zone given by the "zone" query
                      parameter, the X-Timezone header or the CF-Timezone header
  lookup            Resolve one Olson timezone name and print the result
  generate          Print a mapping file built from the TZif footers of the compiled
                      zones under <zoneinfo-dir>. The tzdata version defaults to the
                      contents of <zoneinfo-dir>/version or the tzdata.zi header

Environment:
  TZRESOLVE_LISTEN              Bind address, default 0.0.0.0:8787
  TZRESOLVE_SOURCE_URL          Mapping file URL
  TZRESOLVE_FETCH_TIMEOUT_SECS  Fetch timeout, default 30
  TZRESOLVE_CACHE_KEY           Persistent cache key, default timezones.db
  TZRESOLVE_CACHE_TTL_SECS      Persistent cache TTL, default 86400
  TZRESOLVE_MEMORY_TTL_SECS     In-memory TTL, defaults to the cache TTL, 0 = never
  TZRESOLVE_KV                  none | memory | file:<dir> | http(s)://<base url>
  TZRESOLVE_KV_TOKEN            Bearer token for the remote KV store
  RUST_LOG                      Log filter, default info
"#
    );
}

fn build_resolver(config: &Config, client: HyperClient) -> TimezoneResolver {
    let backend: Option<Arc<dyn KvStore>> = match &config.kv {
        KvBackend::None => None,
        KvBackend::Memory => Some(Arc::new(MemoryKv::new())),
        KvBackend::File(dir) => Some(Arc::new(FileKv::new(dir))),
        KvBackend::Remote(base_url) => Some(Arc::new(RemoteKv::new(
            client.clone(),
            base_url,
            config.kv_token.clone(),
        ))),
    };
    let cache = CacheStore::new(backend, &config.cache_key, config.cache_ttl);
    let fetcher = Fetcher::new(client, &config.source_url, config.fetch_timeout);

    trace!(
        "Using {} as persistent cache for \"{}\"",
        cache.backend_name(),
        config.cache_key
    );
    TimezoneResolver::new(cache, fetcher, config.memory_ttl)
}

async fn start_server() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env()?;
    let resolver = Arc::new(build_resolver(&config, net::build_client()?));

    let listener = TcpListener::bind(config.listen).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let server = tokio::spawn(server::serve(listener, resolver, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    _ = shutdown_tx.send(());

    server.await??;
    Ok(())
}

async fn lookup(zone: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let now = Instant::now();
    let config = Config::from_env()?;
    let resolver = build_resolver(&config, net::build_client()?);

    let refresh = resolver.refresh().await?;
    if let Some(write_through) = refresh.write_through {
        write_through.await?;
    }

    let resolution = resolver.resolve(zone).await?;
    println!("{}", resolution.linux_tz());
    if let Lookup::Defaulted(fallback) = &resolution.lookup {
        eprintln!("No valid mapping for \"{}\" ({:?})", zone, fallback);
    }
    if let Some(metadata) = resolver.metadata() {
        eprintln!(
            "tzdata {} built {} (loaded via {:?})",
            metadata.version().unwrap_or("unknown"),
            metadata.build().unwrap_or("unknown"),
            refresh.origin
        );
    }
    trace!("Resolved in {}ms", now.elapsed().as_millis());
    Ok(())
}

async fn generate_table(
    dir: &Path,
    version: Option<&str>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let generated = generate::generate(dir, version).await?;
    print!("{}", generated.text);
    info!(
        "Generated mapping with {} timezones from tzdata version {}",
        generated.zones, generated.version
    );
    Ok(())
}
