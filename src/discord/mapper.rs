//! Pure conversions from gateway model types to store snapshots.
//!
//! Everything here is side-effect free so the guard conditions and field
//! mappings can be tested without a gateway connection.

use chrono::{DateTime, Utc};
use serenity::model::channel::{Attachment, ChannelType, Embed, GuildChannel, Message, ReactionType};
use serenity::model::guild::{Guild, Member};
use serenity::model::user::User;
use std::num::NonZeroU16;
use tracing::warn;

use crate::db::models::{
    AttachmentSnapshot, CategorySnapshot, ChannelKind, ChannelSnapshot, GuildSnapshot,
    GuildSyncSnapshot, MemberSnapshot, MessageSnapshot, ReactionSnapshot, UserSnapshot,
};

pub fn timestamp_to_utc(ts: serenity::model::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Forum => ChannelKind::Forum,
        ChannelType::News => ChannelKind::News,
        ChannelType::Stage => ChannelKind::Stage,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            ChannelKind::Thread
        }
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

// Legacy accounts still carry a nonzero discriminator; migrated accounts
// report none and are stored as NULL.
pub fn discriminator_string(discriminator: Option<NonZeroU16>) -> Option<String> {
    discriminator.map(|d| format!("{:04}", d.get()))
}

pub fn user_snapshot(user: &User) -> UserSnapshot {
    UserSnapshot {
        id: user.id.get() as i64,
        username: user.name.clone(),
        display_name: user.global_name.clone(),
        discriminator: discriminator_string(user.discriminator),
        bot: user.bot,
        created_at: Some(timestamp_to_utc(user.created_at())),
    }
}

pub fn member_snapshot(member: &Member) -> MemberSnapshot {
    MemberSnapshot {
        guild_id: member.guild_id.get() as i64,
        user: user_snapshot(&member.user),
        nickname: member.nick.clone(),
        joined_at: member.joined_at.map(timestamp_to_utc),
        roles: member.roles.iter().map(|r| r.get() as i64).collect(),
    }
}

pub fn channel_snapshot(channel: &GuildChannel) -> ChannelSnapshot {
    ChannelSnapshot {
        id: channel.id.get() as i64,
        guild_id: channel.guild_id.get() as i64,
        category_id: channel.parent_id.map(|p| p.get() as i64),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind),
        position: channel.position as i32,
        created_at: Some(timestamp_to_utc(channel.id.created_at())),
    }
}

pub fn category_snapshot(channel: &GuildChannel) -> CategorySnapshot {
    CategorySnapshot {
        id: channel.id.get() as i64,
        guild_id: channel.guild_id.get() as i64,
        name: channel.name.clone(),
        position: channel.position as i32,
        created_at: Some(timestamp_to_utc(channel.id.created_at())),
    }
}

fn attachment_snapshot(attachment: &Attachment) -> AttachmentSnapshot {
    AttachmentSnapshot {
        id: attachment.id.get() as i64,
        filename: attachment.filename.clone(),
        url: attachment.url.clone(),
        proxy_url: attachment.proxy_url.clone(),
        size: attachment.size as i64,
        content_type: attachment.content_type.clone(),
    }
}

fn embed_values(embeds: &[Embed], message_id: u64) -> Vec<serde_json::Value> {
    embeds
        .iter()
        .filter_map(|embed| match serde_json::to_value(embed) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(message_id, "dropping unserializable embed: {err}");
                None
            }
        })
        .collect()
}

pub fn message_snapshot(message: &Message, guild_id: i64) -> MessageSnapshot {
    MessageSnapshot {
        id: message.id.get() as i64,
        channel_id: message.channel_id.get() as i64,
        guild_id,
        author: user_snapshot(&message.author),
        content: message.content.clone(),
        created_at: timestamp_to_utc(message.timestamp),
        edited_at: message.edited_timestamp.map(timestamp_to_utc),
        kind: format!("{:?}", message.kind),
        embeds: embed_values(&message.embeds, message.id.get()),
        attachments: message.attachments.iter().map(attachment_snapshot).collect(),
    }
}

/// Splits an emoji into the columns the store keeps: display name,
/// custom-emoji id and the animated flag. Unicode emoji have no id.
pub fn reaction_parts(emoji: &ReactionType) -> (String, Option<i64>, bool) {
    match emoji {
        ReactionType::Unicode(name) => (name.clone(), None, false),
        ReactionType::Custom { animated, id, name } => (
            name.clone().unwrap_or_default(),
            Some(id.get() as i64),
            *animated,
        ),
        _ => (String::new(), None, false),
    }
}

pub fn reaction_snapshot(
    message_id: i64,
    user: &User,
    emoji: &ReactionType,
) -> ReactionSnapshot {
    let (emoji_name, emoji_id, emoji_animated) = reaction_parts(emoji);
    ReactionSnapshot {
        message_id,
        user: user_snapshot(user),
        emoji_name,
        emoji_id,
        emoji_animated,
        created_at: Utc::now(),
    }
}

/// Captures everything a full resync needs from a cached guild. Channel
/// iteration is split by kind: categories get their own rows, mirrorable
/// channels are kept, the rest is left for the syncer to count as
/// skipped. Sorted by id so resync order is deterministic.
pub fn guild_sync_snapshot(guild: &Guild) -> GuildSyncSnapshot {
    let mut categories = Vec::new();
    let mut channels = Vec::new();
    for channel in guild.channels.values() {
        if channel.kind == ChannelType::Category {
            categories.push(category_snapshot(channel));
        } else {
            channels.push(channel_snapshot(channel));
        }
    }
    categories.sort_by_key(|c| c.id);
    channels.sort_by_key(|c| c.id);

    let mut members: Vec<MemberSnapshot> =
        guild.members.values().map(member_snapshot).collect();
    members.sort_by_key(|m| m.user.id);

    GuildSyncSnapshot {
        guild: GuildSnapshot {
            id: guild.id.get() as i64,
            name: guild.name.clone(),
            owner_id: Some(guild.owner_id.get() as i64),
            member_count: Some(guild.member_count as i64),
            created_at: Some(timestamp_to_utc(guild.id.created_at())),
        },
        categories,
        channels,
        members,
    }
}
