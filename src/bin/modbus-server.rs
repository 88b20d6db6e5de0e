// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI entry point: runs a Modbus TCP server against either the in-memory
//! backend (default) or the external-KV (Redis) backend, when a Redis URL
//! and an address-map file are given.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, LevelFilter};

use modbus_server::datastore::external_kv::{AddressMapDocument, ExternalKvDatastore};
use modbus_server::datastore::memory::InMemoryDatastore;
use modbus_server::{Datastore, Server};

#[derive(Parser, Debug)]
#[command(author, version, about = "Async Modbus TCP server", long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5020)]
    port: u16,

    /// Log verbosity: DEBUG, INFO, WARNING, or ERROR.
    #[arg(long, default_value = "INFO")]
    loglevel: String,

    /// Redis connection URL. Selects the external-KV backend; requires
    /// `--address-map`.
    #[arg(long)]
    redis_url: Option<String>,

    /// Path to an address-map JSON document for the external-KV backend.
    #[arg(long, requires = "redis_url", value_name = "FILE")]
    address_map: Option<PathBuf>,
}

fn parse_loglevel(raw: &str) -> LevelFilter {
    match raw.to_ascii_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "WARNING" | "WARN" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

async fn build_datastore(args: &Args) -> Result<Arc<dyn Datastore>, Box<dyn std::error::Error>> {
    match &args.redis_url {
        Some(redis_url) => {
            let address_map_path = args
                .address_map
                .as_ref()
                .ok_or("--address-map is required when --redis-url is given")?;
            let raw = std::fs::read_to_string(address_map_path)?;
            let document: AddressMapDocument = serde_json::from_str(&raw)?;
            let backend = ExternalKvDatastore::connect(redis_url, document).await?;
            backend.apply_initial_values().await?;
            Ok(Arc::new(backend))
        }
        None => Ok(Arc::new(InMemoryDatastore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(parse_loglevel(&args.loglevel))
        .init();

    let datastore = build_datastore(&args).await?;
    let addr = format!("{}:{}", args.host, args.port).parse()?;
    let mut server = Server::bind(addr, datastore).await?;
    info!("listening on {}", server.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    server.stop().await;

    Ok(())
}
