#![forbid(unsafe_code)]

mod cli;
mod config;
mod db;
mod discord;
mod sync;
mod utils;

use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;
    utils::logging::init_tracing(&config.logging.level, &config.logging.format);

    info!("starting guild-mirror");

    let db = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db.migrate().await?;

    let syncer = Arc::new(sync::GuildSyncer::new(db.clone()));
    let client = discord::MirrorClient::new(&config, db, syncer);

    tokio::select! {
        result = client.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
