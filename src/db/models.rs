use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel classification as observed from the gateway. Only a subset is
/// mirrored into the store; the rest is skipped and counted by resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
    Forum,
    News,
    Stage,
    Thread,
    Category,
    Other,
}

impl ChannelKind {
    pub fn is_persistable(&self) -> bool {
        matches!(self, ChannelKind::Text | ChannelKind::Voice | ChannelKind::Forum)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Voice => "voice",
            ChannelKind::Forum => "forum",
            ChannelKind::News => "news",
            ChannelKind::Stage => "stage",
            ChannelKind::Thread => "thread",
            ChannelKind::Category => "category",
            ChannelKind::Other => "other",
        }
    }
}

/// Point-in-time view of a guild as delivered by the gateway. Optional
/// fields stay optional all the way into the store; placeholders are
/// never fabricated.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub id: i64,
    pub name: String,
    pub owner_id: Option<i64>,
    pub member_count: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CategorySnapshot {
    pub id: i64,
    pub guild_id: i64,
    pub name: String,
    pub position: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub id: i64,
    pub guild_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub kind: ChannelKind,
    pub position: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub discriminator: Option<String>,
    pub bot: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Membership carries its user: a member-join event may be the first time
/// the user is seen, so the store cascades the user write.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub guild_id: i64,
    pub user: UserSnapshot,
    pub nickname: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub roles: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    pub id: i64,
    pub filename: String,
    pub url: String,
    pub proxy_url: String,
    pub size: i64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    pub id: i64,
    pub channel_id: i64,
    pub guild_id: i64,
    pub author: UserSnapshot,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub kind: String,
    pub embeds: Vec<serde_json::Value>,
    pub attachments: Vec<AttachmentSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ReactionSnapshot {
    pub message_id: i64,
    pub user: UserSnapshot,
    pub emoji_name: String,
    pub emoji_id: Option<i64>,
    pub emoji_animated: bool,
    pub created_at: DateTime<Utc>,
}

/// One observed content change. `old_content` is whatever the gateway
/// supplied; it is nullable and never reconstructed.
#[derive(Debug, Clone)]
pub struct MessageEdit {
    pub message_id: i64,
    pub old_content: Option<String>,
    pub new_content: String,
    pub edited_at: DateTime<Utc>,
}

/// Deletion audit row, built from the mirrored message row. Kept apart
/// from `messages` so the live row survives for analytics.
#[derive(Debug, Clone)]
pub struct MessageTombstone {
    pub message_id: i64,
    pub channel_id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub content: String,
    pub deleted_at: DateTime<Utc>,
    pub original_created_at: Option<DateTime<Utc>>,
}

/// Everything a full resync needs, captured from the gateway cache before
/// any await point.
#[derive(Debug, Clone)]
pub struct GuildSyncSnapshot {
    pub guild: GuildSnapshot,
    pub categories: Vec<CategorySnapshot>,
    pub channels: Vec<ChannelSnapshot>,
    pub members: Vec<MemberSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRecord {
    pub id: i64,
    pub name: String,
    pub owner_id: Option<i64>,
    pub member_count: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub discriminator: Option<String>,
    pub bot: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub guild_id: i64,
    pub user_id: i64,
    pub nickname: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub roles: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub channel_id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub kind: String,
    pub embeds: Option<String>,
    pub attachments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub id: i64,
    pub message_id: i64,
    pub filename: String,
    pub url: String,
    pub proxy_url: String,
    pub size: i64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEditRecord {
    pub id: i64,
    pub message_id: i64,
    pub old_content: Option<String>,
    pub new_content: String,
    pub edited_at: DateTime<Utc>,
}

/// Aggregate counts for one guild, as reported by the stats command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuildStats {
    pub messages: i64,
    pub users: i64,
    pub channels: i64,
    pub reactions: i64,
}
