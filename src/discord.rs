pub mod commands;
pub mod handler;
pub mod mapper;

pub use handler::MirrorEventHandler;

use anyhow::Context as _;
use serenity::Client;
use serenity::prelude::GatewayIntents;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::sync::GuildSyncer;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Owns the gateway connection lifecycle. serenity reconnects sessions
/// on its own; this loop only covers hard client failures, with a
/// doubling delay between attempts.
pub struct MirrorClient {
    token: String,
    handler: MirrorEventHandler,
}

impl MirrorClient {
    pub fn new(config: &Config, db: Arc<DatabaseManager>, syncer: Arc<GuildSyncer>) -> Self {
        Self {
            token: config.auth.bot_token.clone(),
            handler: MirrorEventHandler::new(db, syncer, config.commands.prefix.clone()),
        }
    }

    fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::MESSAGE_CONTENT
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let mut delay = INITIAL_RECONNECT_DELAY;
        loop {
            let mut client = Client::builder(&self.token, Self::intents())
                .event_handler(self.handler.clone())
                .await
                .context("failed to build gateway client")?;

            info!("connecting to the gateway");
            match client.start().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    error!("gateway client stopped: {e}, reconnecting in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RECONNECT_DELAY);
                }
            }
        }
    }
}
