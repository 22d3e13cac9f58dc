use chrono::Utc;
use serenity::async_trait;
use serenity::builder::{CreateEmbed, CreateMessage};
use serenity::model::channel::{GuildChannel, Message, Reaction};
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::model::guild::{Guild, Member};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use serenity::prelude::{Context, EventHandler};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::models::{ChannelKind, MessageEdit, MessageTombstone};
use crate::db::{DatabaseError, DatabaseManager, RetryPolicy, with_retry};
use crate::sync::GuildSyncer;

use super::commands::{self, MirrorCommand};
use super::mapper;

// Constraint violations mean the parent rows were never mirrored. The
// write is dropped; everything else is a real failure.
fn log_store_error(what: &str, id: i64, err: DatabaseError) {
    match err {
        DatabaseError::Constraint(reason) => {
            warn!(id, "dropping {what}: parent rows missing: {reason}");
        }
        other => error!(id, "failed to persist {what}: {other}"),
    }
}

/// Translates gateway callbacks into store writes. Every handler is
/// independent: a failed write is logged and dropped, never allowed to
/// take the gateway connection down.
#[derive(Clone)]
pub struct MirrorEventHandler {
    db: Arc<DatabaseManager>,
    syncer: Arc<GuildSyncer>,
    retry: RetryPolicy,
    command_prefix: String,
}

impl MirrorEventHandler {
    pub fn new(db: Arc<DatabaseManager>, syncer: Arc<GuildSyncer>, command_prefix: String) -> Self {
        Self {
            db,
            syncer,
            retry: RetryPolicy::default(),
            command_prefix,
        }
    }

    async fn persist_channel(&self, channel: &GuildChannel) {
        let kind = mapper::channel_kind(channel.kind);
        if kind == ChannelKind::Category {
            let category = mapper::category_snapshot(channel);
            let store = self.db.guild_store();
            if let Err(e) = with_retry(self.retry, || store.upsert_category(&category)).await {
                log_store_error("category", category.id, e);
            }
        } else if kind.is_persistable() {
            let snapshot = mapper::channel_snapshot(channel);
            let store = self.db.guild_store();
            if let Err(e) = with_retry(self.retry, || store.upsert_channel(&snapshot)).await {
                log_store_error("channel", snapshot.id, e);
            }
        } else {
            debug!(
                channel_id = channel.id.get(),
                kind = kind.as_str(),
                "ignoring channel of unmirrored kind"
            );
        }
    }

    async fn handle_sync(&self, ctx: &Context, msg: &Message) {
        // GuildRef borrows the cache and is not Send; the permission
        // check and the snapshot are both taken in one statement before
        // any await.
        let capture = msg.guild(&ctx.cache).map(|guild| {
            (
                commands::is_administrator(&guild, msg),
                mapper::guild_sync_snapshot(&guild),
            )
        });
        let Some((is_admin, snapshot)) = capture else {
            warn!("sync command outside a cached guild, ignoring");
            return;
        };

        if !is_admin {
            warn!(
                user_id = msg.author.id.get(),
                "sync command rejected: missing Administrator permission"
            );
            let _ = msg
                .channel_id
                .say(&ctx.http, "This command requires the Administrator permission.")
                .await;
            return;
        }

        match self.syncer.sync_guild(&snapshot).await {
            Ok(report) => {
                let reply = format!(
                    "Sync complete: {} categories, {} channels ({} skipped), {} members.",
                    report.categories, report.channels, report.skipped_channels, report.members
                );
                if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                    warn!("failed to send sync report: {e}");
                }
            }
            Err(e) => {
                error!(guild_id = snapshot.guild.id, "manual sync failed: {e}");
                let _ = msg
                    .channel_id
                    .say(&ctx.http, "Sync failed, check the logs.")
                    .await;
            }
        }
    }

    async fn handle_stats(&self, ctx: &Context, msg: &Message) {
        let Some(guild_id) = msg.guild_id else { return };
        match self.db.stats_store().guild_stats(guild_id.get() as i64).await {
            Ok(stats) => {
                let embed = CreateEmbed::new()
                    .title("Guild statistics")
                    .field("Messages", stats.messages.to_string(), true)
                    .field("Users", stats.users.to_string(), true)
                    .field("Channels", stats.channels.to_string(), true)
                    .field("Reactions", stats.reactions.to_string(), true);
                if let Err(e) = msg
                    .channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await
                {
                    warn!("failed to send stats reply: {e}");
                }
            }
            Err(e) => {
                error!(guild_id = guild_id.get(), "stats query failed: {e}");
                let _ = msg
                    .channel_id
                    .say(&ctx.http, "Stats query failed, check the logs.")
                    .await;
            }
        }
    }
}

#[async_trait]
impl EventHandler for MirrorEventHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            guilds = ready.guilds.len(),
            "gateway session ready as {}", ready.user.name
        );
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!(guild_id = guild.id.get(), guild_name = %guild.name, "joined new guild");
        }
        let snapshot = mapper::guild_sync_snapshot(&guild);
        if let Err(e) = self.syncer.sync_guild(&snapshot).await {
            error!(guild_id = snapshot.guild.id, "startup guild sync failed: {e}");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(guild_id) = msg.guild_id else {
            debug!("ignoring direct message");
            return;
        };

        // Command messages are guild activity too; mirror first, then
        // dispatch.
        let snapshot = mapper::message_snapshot(&msg, guild_id.get() as i64);
        let store = self.db.message_store();
        if let Err(e) = with_retry(self.retry, || store.upsert_message(&snapshot)).await {
            log_store_error("message", snapshot.id, e);
        }

        let Some(command) = commands::parse_command(&self.command_prefix, &msg.content) else {
            return;
        };
        match command {
            MirrorCommand::Sync => self.handle_sync(&ctx, &msg).await,
            MirrorCommand::Stats => self.handle_stats(&ctx, &msg).await,
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        if event.guild_id.is_none() {
            return;
        }
        let Some(new_content) = event.content else {
            debug!(message_id = event.id.get(), "non-content update, skipping");
            return;
        };

        let edit = MessageEdit {
            message_id: event.id.get() as i64,
            old_content: old.map(|m| m.content),
            new_content,
            edited_at: event
                .edited_timestamp
                .map(mapper::timestamp_to_utc)
                .unwrap_or_else(Utc::now),
        };

        let store = self.db.message_store();
        if let Err(e) = with_retry(self.retry, || store.record_edit(&edit)).await {
            log_store_error("message edit", edit.message_id, e);
        }
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        let Some(guild_id) = guild_id else { return };

        // The gateway payload carries no content; the tombstone is built
        // from the mirrored row instead.
        let store = self.db.message_store();
        let mirrored = match store.get_message(deleted_message_id.get() as i64).await {
            Ok(row) => row,
            Err(e) => {
                error!(
                    message_id = deleted_message_id.get(),
                    "failed to look up deleted message: {e}"
                );
                return;
            }
        };
        let Some(mirrored) = mirrored else {
            debug!(
                message_id = deleted_message_id.get(),
                "deletion of a message that was never mirrored, skipping"
            );
            return;
        };

        let tombstone = MessageTombstone {
            message_id: mirrored.id,
            channel_id: channel_id.get() as i64,
            guild_id: guild_id.get() as i64,
            user_id: mirrored.user_id,
            content: mirrored.content,
            deleted_at: Utc::now(),
            original_created_at: Some(mirrored.created_at),
        };
        if let Err(e) = with_retry(self.retry, || store.record_deletion(&tombstone)).await {
            log_store_error("message deletion", tombstone.message_id, e);
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        if reaction.guild_id.is_none() {
            return;
        }
        let user = match reaction.user(&ctx).await {
            Ok(user) => user,
            Err(e) => {
                warn!(
                    message_id = reaction.message_id.get(),
                    "failed to resolve reacting user: {e}"
                );
                return;
            }
        };
        if user.bot {
            return;
        }

        let snapshot =
            mapper::reaction_snapshot(reaction.message_id.get() as i64, &user, &reaction.emoji);
        let store = self.db.message_store();
        if let Err(e) = with_retry(self.retry, || store.upsert_reaction(&snapshot)).await {
            log_store_error("reaction", snapshot.message_id, e);
        }
    }

    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        let snapshot = mapper::member_snapshot(&member);
        let store = self.db.user_store();
        if let Err(e) = with_retry(self.retry, || store.upsert_member(&snapshot)).await {
            log_store_error("member", snapshot.user.id, e);
        }
    }

    async fn channel_create(&self, _ctx: Context, channel: GuildChannel) {
        self.persist_channel(&channel).await;
    }

    async fn channel_update(&self, _ctx: Context, _old: Option<GuildChannel>, new: GuildChannel) {
        self.persist_channel(&new).await;
    }
}
