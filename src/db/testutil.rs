// Fixture builders shared by the store, manager and sync tests.

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::config::DatabaseConfig;

use super::DatabaseManager;
use super::models::{
    AttachmentSnapshot, CategorySnapshot, ChannelKind, ChannelSnapshot, GuildSnapshot,
    MemberSnapshot, MessageSnapshot, ReactionSnapshot, UserSnapshot,
};

pub(crate) async fn open_manager(file: &NamedTempFile) -> DatabaseManager {
    let config = DatabaseConfig {
        filename: file.path().to_string_lossy().into_owned(),
    };
    let db = DatabaseManager::new(&config).await.expect("database manager");
    db.migrate().await.expect("migrations");
    db
}

pub(crate) fn guild_snapshot(id: i64) -> GuildSnapshot {
    GuildSnapshot {
        id,
        name: format!("guild-{id}"),
        owner_id: Some(1),
        member_count: Some(3),
        created_at: Some(Utc::now()),
    }
}

pub(crate) fn category_snapshot(id: i64, guild_id: i64) -> CategorySnapshot {
    CategorySnapshot {
        id,
        guild_id,
        name: format!("category-{id}"),
        position: 0,
        created_at: None,
    }
}

pub(crate) fn channel_snapshot(id: i64, guild_id: i64, kind: ChannelKind) -> ChannelSnapshot {
    ChannelSnapshot {
        id,
        guild_id,
        category_id: None,
        name: format!("channel-{id}"),
        kind,
        position: 0,
        created_at: None,
    }
}

pub(crate) fn text_channel_snapshot(id: i64, guild_id: i64) -> ChannelSnapshot {
    channel_snapshot(id, guild_id, ChannelKind::Text)
}

pub(crate) fn user_snapshot(id: i64) -> UserSnapshot {
    UserSnapshot {
        id,
        username: format!("user-{id}"),
        display_name: None,
        discriminator: None,
        bot: false,
        created_at: Some(Utc::now()),
    }
}

pub(crate) fn member_snapshot(guild_id: i64, user_id: i64) -> MemberSnapshot {
    MemberSnapshot {
        guild_id,
        user: user_snapshot(user_id),
        nickname: None,
        joined_at: Some(Utc::now()),
        roles: vec![guild_id],
    }
}

pub(crate) fn message_snapshot(
    id: i64,
    channel_id: i64,
    guild_id: i64,
    author_id: i64,
    content: &str,
) -> MessageSnapshot {
    MessageSnapshot {
        id,
        channel_id,
        guild_id,
        author: user_snapshot(author_id),
        content: content.to_string(),
        created_at: Utc::now(),
        edited_at: None,
        kind: "default".to_string(),
        embeds: Vec::new(),
        attachments: Vec::new(),
    }
}

pub(crate) fn attachment_snapshot(id: i64, filename: &str) -> AttachmentSnapshot {
    AttachmentSnapshot {
        id,
        filename: filename.to_string(),
        url: format!("https://cdn.example/{id}/{filename}"),
        proxy_url: format!("https://proxy.example/{id}/{filename}"),
        size: 2048,
        content_type: Some("image/png".to_string()),
    }
}

pub(crate) fn reaction_snapshot(message_id: i64, user_id: i64, emoji: &str) -> ReactionSnapshot {
    ReactionSnapshot {
        message_id,
        user: user_snapshot(user_id),
        emoji_name: emoji.to_string(),
        emoji_id: None,
        emoji_animated: false,
        created_at: Utc::now(),
    }
}
