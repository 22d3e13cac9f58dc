use async_trait::async_trait;

use super::DatabaseError;
use super::models::{
    AttachmentRecord, CategorySnapshot, ChannelSnapshot, GuildRecord, GuildSnapshot, GuildStats,
    MemberRecord, MemberSnapshot, MessageEdit, MessageEditRecord, MessageRecord, MessageSnapshot,
    MessageTombstone, ReactionSnapshot, UserRecord, UserSnapshot,
};

/// Structural entities of one guild. Upserts are idempotent: mutable
/// display fields are overwritten, immutable fields (creation time,
/// first-join time) are only set on first insert.
#[async_trait]
pub trait GuildStore: Send + Sync {
    async fn upsert_guild(&self, guild: &GuildSnapshot) -> Result<(), DatabaseError>;
    async fn upsert_category(&self, category: &CategorySnapshot) -> Result<(), DatabaseError>;
    async fn upsert_channel(&self, channel: &ChannelSnapshot) -> Result<(), DatabaseError>;
    async fn get_guild(&self, guild_id: i64) -> Result<Option<GuildRecord>, DatabaseError>;
}

/// Global users and per-guild memberships. `upsert_member` cascades: the
/// embedded user row is written first, in the same transaction, because a
/// member-join event may be the first time the user is observed.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, user: &UserSnapshot) -> Result<(), DatabaseError>;
    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, DatabaseError>;
    async fn upsert_member(&self, member: &MemberSnapshot) -> Result<(), DatabaseError>;
    async fn get_member(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRecord>, DatabaseError>;
}

/// Messages and their satellite rows. Compound writes (message plus
/// attachments, edit row plus live-row refresh, reaction plus reacting
/// user) each run in a single transaction; partial application is never
/// reported as success.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn upsert_message(&self, message: &MessageSnapshot) -> Result<(), DatabaseError>;
    async fn get_message(&self, message_id: i64) -> Result<Option<MessageRecord>, DatabaseError>;
    async fn list_attachments(
        &self,
        message_id: i64,
    ) -> Result<Vec<AttachmentRecord>, DatabaseError>;
    async fn record_edit(&self, edit: &MessageEdit) -> Result<(), DatabaseError>;
    async fn list_edits(&self, message_id: i64)
    -> Result<Vec<MessageEditRecord>, DatabaseError>;
    async fn record_deletion(&self, tombstone: &MessageTombstone) -> Result<(), DatabaseError>;
    async fn get_deletion(
        &self,
        message_id: i64,
    ) -> Result<Option<MessageTombstone>, DatabaseError>;
    async fn upsert_reaction(&self, reaction: &ReactionSnapshot) -> Result<(), DatabaseError>;
}

/// Read-only aggregates, scoped by guild. Runs on its own connection,
/// never inside a write transaction.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn guild_stats(&self, guild_id: i64) -> Result<GuildStats, DatabaseError>;
}
