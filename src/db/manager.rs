use diesel::RunQueryDsl;
use std::sync::Arc;
use tracing::info;

use crate::config::DatabaseConfig;

use super::sqlite::{
    SqliteGuildStore, SqliteMessageStore, SqliteStatsStore, SqliteUserStore, establish_connection,
};
use super::stores::{GuildStore, MessageStore, StatsStore, UserStore};
use super::DatabaseError;

// Existence-checked DDL, executed on every start. Statements never drop
// or rewrite existing tables, so a second instance racing a first one is
// harmless.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS guilds (
        guild_id BIGINT PRIMARY KEY,
        guild_name TEXT NOT NULL,
        owner_id BIGINT,
        member_count BIGINT,
        created_at TEXT,
        joined_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        category_id BIGINT PRIMARY KEY,
        guild_id BIGINT NOT NULL REFERENCES guilds(guild_id) ON DELETE CASCADE,
        category_name TEXT NOT NULL,
        position INTEGER NOT NULL,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS channels (
        channel_id BIGINT PRIMARY KEY,
        guild_id BIGINT NOT NULL REFERENCES guilds(guild_id) ON DELETE CASCADE,
        category_id BIGINT REFERENCES categories(category_id) ON DELETE SET NULL,
        channel_name TEXT NOT NULL,
        channel_kind TEXT NOT NULL,
        position INTEGER NOT NULL,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS users (
        user_id BIGINT PRIMARY KEY,
        username TEXT NOT NULL,
        display_name TEXT,
        discriminator TEXT,
        bot BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT,
        first_seen TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS guild_members (
        guild_id BIGINT NOT NULL REFERENCES guilds(guild_id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        nickname TEXT,
        joined_at TEXT,
        roles TEXT NOT NULL,
        PRIMARY KEY (guild_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        message_id BIGINT PRIMARY KEY,
        channel_id BIGINT NOT NULL REFERENCES channels(channel_id) ON DELETE CASCADE,
        guild_id BIGINT NOT NULL REFERENCES guilds(guild_id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(user_id),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        edited_at TEXT,
        message_kind TEXT NOT NULL,
        embeds TEXT,
        attachments TEXT
    )",
    "CREATE TABLE IF NOT EXISTS attachments (
        attachment_id BIGINT PRIMARY KEY,
        message_id BIGINT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
        filename TEXT NOT NULL,
        url TEXT NOT NULL,
        proxy_url TEXT NOT NULL,
        size BIGINT NOT NULL,
        content_type TEXT
    )",
    "CREATE TABLE IF NOT EXISTS reactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id BIGINT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(user_id),
        emoji_name TEXT NOT NULL,
        emoji_id BIGINT,
        emoji_animated BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_reactions_unique
        ON reactions(message_id, user_id, emoji_name)",
    "CREATE TABLE IF NOT EXISTS message_edits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id BIGINT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
        old_content TEXT,
        new_content TEXT NOT NULL,
        edited_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS deleted_messages (
        message_id BIGINT PRIMARY KEY,
        channel_id BIGINT NOT NULL,
        guild_id BIGINT NOT NULL,
        user_id BIGINT NOT NULL,
        content TEXT NOT NULL,
        deleted_at TEXT NOT NULL,
        original_created_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_guild ON messages(guild_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id)",
    "CREATE INDEX IF NOT EXISTS idx_channels_guild ON channels(guild_id)",
    "CREATE INDEX IF NOT EXISTS idx_guild_members_user ON guild_members(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_message_edits_message ON message_edits(message_id)",
];

/// Owns the store handles and the schema lifecycle. Stores share the
/// database path and open their own connections per operation.
pub struct DatabaseManager {
    db_path: Arc<String>,
    guild_store: Arc<dyn GuildStore>,
    user_store: Arc<dyn UserStore>,
    message_store: Arc<dyn MessageStore>,
    stats_store: Arc<dyn StatsStore>,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db_path = Arc::new(config.filename.clone());
        Ok(Self {
            guild_store: Arc::new(SqliteGuildStore::new(db_path.clone())),
            user_store: Arc::new(SqliteUserStore::new(db_path.clone())),
            message_store: Arc::new(SqliteMessageStore::new(db_path.clone())),
            stats_store: Arc::new(SqliteStatsStore::new(db_path.clone())),
            db_path,
        })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            for statement in MIGRATIONS {
                diesel::sql_query(*statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }
            Ok::<_, DatabaseError>(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))??;

        info!("database schema is up to date at {}", self.db_path);
        Ok(())
    }

    pub fn guild_store(&self) -> Arc<dyn GuildStore> {
        self.guild_store.clone()
    }

    pub fn user_store(&self) -> Arc<dyn UserStore> {
        self.user_store.clone()
    }

    pub fn message_store(&self) -> Arc<dyn MessageStore> {
        self.message_store.clone()
    }

    pub fn stats_store(&self) -> Arc<dyn StatsStore> {
        self.stats_store.clone()
    }
}
