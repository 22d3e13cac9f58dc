use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::{
    attachments, categories, channels, deleted_messages, guild_members, guilds, message_edits,
    messages, reactions, users,
};

use super::{
    DatabaseError,
    models::{
        AttachmentRecord, CategorySnapshot, ChannelSnapshot, GuildRecord, GuildSnapshot,
        GuildStats, MemberRecord, MemberSnapshot, MessageEdit, MessageEditRecord, MessageRecord,
        MessageSnapshot, MessageTombstone, ReactionSnapshot, UserRecord, UserSnapshot,
    },
};

fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn opt_datetime_to_string(dt: Option<&DateTime<Utc>>) -> Option<String> {
    dt.map(datetime_to_string)
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn opt_string_to_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    s.map(string_to_datetime).transpose()
}

fn map_diesel_error(e: diesel::result::Error) -> DatabaseError {
    use diesel::result::{DatabaseErrorKind, Error};
    match e {
        Error::DatabaseError(kind, info) => {
            let message = info.message().to_string();
            // SQLITE_BUSY arrives with an unknown kind. The lock clears
            // when the competing writer finishes, so it takes the retry
            // path rather than being reported as permanent.
            if message.contains("database is locked")
                || message.contains("database table is locked")
            {
                return DatabaseError::Connection(message);
            }
            match kind {
                DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation => DatabaseError::Constraint(message),
                _ if message.contains("constraint") => DatabaseError::Constraint(message),
                _ => DatabaseError::Query(message),
            }
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

// One connection per logical operation, released when the blocking task
// returns. Foreign keys are off by default in SQLite and must be enabled
// per connection for the strict ordering policy to be observable.
pub(crate) fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    let mut conn = SqliteConnection::establish(path)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    Ok(conn)
}

#[derive(Insertable)]
#[diesel(table_name = guilds)]
struct NewGuild<'a> {
    guild_id: i64,
    guild_name: &'a str,
    owner_id: Option<i64>,
    member_count: Option<i64>,
    created_at: Option<String>,
    joined_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = guilds)]
struct DbGuild {
    guild_id: i64,
    guild_name: String,
    owner_id: Option<i64>,
    member_count: Option<i64>,
    created_at: Option<String>,
    joined_at: String,
}

impl DbGuild {
    fn to_record(&self) -> Result<GuildRecord, DatabaseError> {
        Ok(GuildRecord {
            id: self.guild_id,
            name: self.guild_name.clone(),
            owner_id: self.owner_id,
            member_count: self.member_count,
            created_at: opt_string_to_datetime(self.created_at.as_deref())?,
            joined_at: string_to_datetime(&self.joined_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = categories)]
struct NewCategory<'a> {
    category_id: i64,
    guild_id: i64,
    category_name: &'a str,
    position: i32,
    created_at: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = channels)]
struct NewChannel<'a> {
    channel_id: i64,
    guild_id: i64,
    category_id: Option<i64>,
    channel_name: &'a str,
    channel_kind: &'a str,
    position: i32,
    created_at: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    user_id: i64,
    username: &'a str,
    display_name: Option<&'a str>,
    discriminator: Option<&'a str>,
    bot: bool,
    created_at: Option<String>,
    first_seen: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUser {
    user_id: i64,
    username: String,
    display_name: Option<String>,
    discriminator: Option<String>,
    bot: bool,
    created_at: Option<String>,
    first_seen: String,
}

impl DbUser {
    fn to_record(&self) -> Result<UserRecord, DatabaseError> {
        Ok(UserRecord {
            id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            discriminator: self.discriminator.clone(),
            bot: self.bot,
            created_at: opt_string_to_datetime(self.created_at.as_deref())?,
            first_seen: string_to_datetime(&self.first_seen)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = guild_members)]
struct NewMember<'a> {
    guild_id: i64,
    user_id: i64,
    nickname: Option<&'a str>,
    joined_at: Option<String>,
    roles: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = guild_members)]
struct DbMember {
    guild_id: i64,
    user_id: i64,
    nickname: Option<String>,
    joined_at: Option<String>,
    roles: String,
}

impl DbMember {
    fn to_record(&self) -> Result<MemberRecord, DatabaseError> {
        let roles: Vec<i64> = serde_json::from_str(&self.roles)
            .map_err(|e| DatabaseError::Query(format!("invalid roles payload: {}", e)))?;
        Ok(MemberRecord {
            guild_id: self.guild_id,
            user_id: self.user_id,
            nickname: self.nickname.clone(),
            joined_at: opt_string_to_datetime(self.joined_at.as_deref())?,
            roles,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessage<'a> {
    message_id: i64,
    channel_id: i64,
    guild_id: i64,
    user_id: i64,
    content: &'a str,
    created_at: String,
    edited_at: Option<String>,
    message_kind: &'a str,
    embeds: Option<String>,
    attachments: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
struct DbMessage {
    message_id: i64,
    channel_id: i64,
    guild_id: i64,
    user_id: i64,
    content: String,
    created_at: String,
    edited_at: Option<String>,
    message_kind: String,
    embeds: Option<String>,
    attachments: Option<String>,
}

impl DbMessage {
    fn to_record(&self) -> Result<MessageRecord, DatabaseError> {
        Ok(MessageRecord {
            id: self.message_id,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            user_id: self.user_id,
            content: self.content.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            edited_at: opt_string_to_datetime(self.edited_at.as_deref())?,
            kind: self.message_kind.clone(),
            embeds: self.embeds.clone(),
            attachments: self.attachments.clone(),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = attachments)]
struct NewAttachment<'a> {
    attachment_id: i64,
    message_id: i64,
    filename: &'a str,
    url: &'a str,
    proxy_url: &'a str,
    size: i64,
    content_type: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = attachments)]
struct DbAttachment {
    attachment_id: i64,
    message_id: i64,
    filename: String,
    url: String,
    proxy_url: String,
    size: i64,
    content_type: Option<String>,
}

impl DbAttachment {
    fn to_record(&self) -> AttachmentRecord {
        AttachmentRecord {
            id: self.attachment_id,
            message_id: self.message_id,
            filename: self.filename.clone(),
            url: self.url.clone(),
            proxy_url: self.proxy_url.clone(),
            size: self.size,
            content_type: self.content_type.clone(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = reactions)]
struct NewReaction<'a> {
    message_id: i64,
    user_id: i64,
    emoji_name: &'a str,
    emoji_id: Option<i64>,
    emoji_animated: bool,
    created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = message_edits)]
struct NewMessageEdit<'a> {
    message_id: i64,
    old_content: Option<&'a str>,
    new_content: &'a str,
    edited_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = message_edits)]
struct DbMessageEdit {
    id: i32,
    message_id: i64,
    old_content: Option<String>,
    new_content: String,
    edited_at: String,
}

impl DbMessageEdit {
    fn to_record(&self) -> Result<MessageEditRecord, DatabaseError> {
        Ok(MessageEditRecord {
            id: self.id as i64,
            message_id: self.message_id,
            old_content: self.old_content.clone(),
            new_content: self.new_content.clone(),
            edited_at: string_to_datetime(&self.edited_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = deleted_messages)]
struct NewDeletedMessage<'a> {
    message_id: i64,
    channel_id: i64,
    guild_id: i64,
    user_id: i64,
    content: &'a str,
    deleted_at: String,
    original_created_at: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = deleted_messages)]
struct DbDeletedMessage {
    message_id: i64,
    channel_id: i64,
    guild_id: i64,
    user_id: i64,
    content: String,
    deleted_at: String,
    original_created_at: Option<String>,
}

impl DbDeletedMessage {
    fn to_tombstone(&self) -> Result<MessageTombstone, DatabaseError> {
        Ok(MessageTombstone {
            message_id: self.message_id,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            user_id: self.user_id,
            content: self.content.clone(),
            deleted_at: string_to_datetime(&self.deleted_at)?,
            original_created_at: opt_string_to_datetime(self.original_created_at.as_deref())?,
        })
    }
}

// Shared by every operation that mentions a user. First-seen and
// creation time are insert-only; display fields are last-write-wins.
fn upsert_user_tx(
    conn: &mut SqliteConnection,
    user: &UserSnapshot,
) -> Result<(), diesel::result::Error> {
    let new_user = NewUser {
        user_id: user.id,
        username: &user.username,
        display_name: user.display_name.as_deref(),
        discriminator: user.discriminator.as_deref(),
        bot: user.bot,
        created_at: opt_datetime_to_string(user.created_at.as_ref()),
        first_seen: datetime_to_string(&Utc::now()),
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .on_conflict(users::user_id)
        .do_update()
        .set((
            users::username.eq(&user.username),
            users::display_name.eq(user.display_name.as_deref()),
            users::discriminator.eq(user.discriminator.as_deref()),
            users::bot.eq(user.bot),
        ))
        .execute(conn)?;
    Ok(())
}

pub struct SqliteGuildStore {
    db_path: Arc<String>,
}

impl SqliteGuildStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::GuildStore for SqliteGuildStore {
    async fn upsert_guild(&self, guild: &GuildSnapshot) -> Result<(), DatabaseError> {
        let guild = guild.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_guild = NewGuild {
                guild_id: guild.id,
                guild_name: &guild.name,
                owner_id: guild.owner_id,
                member_count: guild.member_count,
                created_at: opt_datetime_to_string(guild.created_at.as_ref()),
                joined_at: datetime_to_string(&Utc::now()),
            };

            diesel::insert_into(guilds::table)
                .values(&new_guild)
                .on_conflict(guilds::guild_id)
                .do_update()
                .set((
                    guilds::guild_name.eq(&guild.name),
                    guilds::owner_id.eq(guild.owner_id),
                    guilds::member_count.eq(guild.member_count),
                ))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn upsert_category(&self, category: &CategorySnapshot) -> Result<(), DatabaseError> {
        let category = category.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_category = NewCategory {
                category_id: category.id,
                guild_id: category.guild_id,
                category_name: &category.name,
                position: category.position,
                created_at: opt_datetime_to_string(category.created_at.as_ref()),
            };

            diesel::insert_into(categories::table)
                .values(&new_category)
                .on_conflict(categories::category_id)
                .do_update()
                .set((
                    categories::category_name.eq(&category.name),
                    categories::position.eq(category.position),
                ))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn upsert_channel(&self, channel: &ChannelSnapshot) -> Result<(), DatabaseError> {
        let channel = channel.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let kind = channel.kind.as_str();
            let new_channel = NewChannel {
                channel_id: channel.id,
                guild_id: channel.guild_id,
                category_id: channel.category_id,
                channel_name: &channel.name,
                channel_kind: kind,
                position: channel.position,
                created_at: opt_datetime_to_string(channel.created_at.as_ref()),
            };

            diesel::insert_into(channels::table)
                .values(&new_channel)
                .on_conflict(channels::channel_id)
                .do_update()
                .set((
                    channels::channel_name.eq(&channel.name),
                    channels::channel_kind.eq(kind),
                    channels::category_id.eq(channel.category_id),
                    channels::position.eq(channel.position),
                ))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_guild(&self, guild_id: i64) -> Result<Option<GuildRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            guilds::table
                .filter(guilds::guild_id.eq(guild_id))
                .select(DbGuild::as_select())
                .first::<DbGuild>(&mut conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(|g| g.to_record())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteUserStore {
    db_path: Arc<String>,
}

impl SqliteUserStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::UserStore for SqliteUserStore {
    async fn upsert_user(&self, user: &UserSnapshot) -> Result<(), DatabaseError> {
        let user = user.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            upsert_user_tx(&mut conn, &user).map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            users::table
                .filter(users::user_id.eq(user_id))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(|u| u.to_record())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn upsert_member(&self, member: &MemberSnapshot) -> Result<(), DatabaseError> {
        let member = member.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let roles = serde_json::to_string(&member.roles)
                .map_err(|e| DatabaseError::Query(format!("invalid roles payload: {}", e)))?;

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                upsert_user_tx(conn, &member.user)?;

                let new_member = NewMember {
                    guild_id: member.guild_id,
                    user_id: member.user.id,
                    nickname: member.nickname.as_deref(),
                    joined_at: opt_datetime_to_string(member.joined_at.as_ref()),
                    roles: roles.clone(),
                };

                diesel::insert_into(guild_members::table)
                    .values(&new_member)
                    .on_conflict((guild_members::guild_id, guild_members::user_id))
                    .do_update()
                    .set((
                        guild_members::nickname.eq(member.nickname.as_deref()),
                        guild_members::roles.eq(&roles),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_member(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            guild_members::table
                .filter(guild_members::guild_id.eq(guild_id))
                .filter(guild_members::user_id.eq(user_id))
                .select(DbMember::as_select())
                .first::<DbMember>(&mut conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(|m| m.to_record())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteMessageStore {
    db_path: Arc<String>,
}

impl SqliteMessageStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

fn encode_json_list<T: serde::Serialize>(list: &[T]) -> Result<Option<String>, DatabaseError> {
    if list.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(list)
        .map(Some)
        .map_err(|e| DatabaseError::Query(format!("invalid json payload: {}", e)))
}

#[async_trait]
impl super::MessageStore for SqliteMessageStore {
    async fn upsert_message(&self, message: &MessageSnapshot) -> Result<(), DatabaseError> {
        let message = message.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let embeds = encode_json_list(&message.embeds)?;
            let attachment_summaries = encode_json_list(&message.attachments)?;
            let edited_at = opt_datetime_to_string(message.edited_at.as_ref());

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                upsert_user_tx(conn, &message.author)?;

                let new_message = NewMessage {
                    message_id: message.id,
                    channel_id: message.channel_id,
                    guild_id: message.guild_id,
                    user_id: message.author.id,
                    content: &message.content,
                    created_at: datetime_to_string(&message.created_at),
                    edited_at: edited_at.clone(),
                    message_kind: &message.kind,
                    embeds: embeds.clone(),
                    attachments: attachment_summaries.clone(),
                };

                diesel::insert_into(messages::table)
                    .values(&new_message)
                    .on_conflict(messages::message_id)
                    .do_update()
                    .set((
                        messages::content.eq(&message.content),
                        messages::edited_at.eq(edited_at.clone()),
                        messages::embeds.eq(embeds.clone()),
                        messages::attachments.eq(attachment_summaries.clone()),
                    ))
                    .execute(conn)?;

                for att in &message.attachments {
                    let new_attachment = NewAttachment {
                        attachment_id: att.id,
                        message_id: message.id,
                        filename: &att.filename,
                        url: &att.url,
                        proxy_url: &att.proxy_url,
                        size: att.size,
                        content_type: att.content_type.as_deref(),
                    };

                    diesel::insert_into(attachments::table)
                        .values(&new_attachment)
                        .on_conflict(attachments::attachment_id)
                        .do_update()
                        .set((
                            attachments::filename.eq(&att.filename),
                            attachments::url.eq(&att.url),
                            attachments::proxy_url.eq(&att.proxy_url),
                            attachments::size.eq(att.size),
                            attachments::content_type.eq(att.content_type.as_deref()),
                        ))
                        .execute(conn)?;
                }
                Ok(())
            })
            .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_message(&self, message_id: i64) -> Result<Option<MessageRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            messages::table
                .filter(messages::message_id.eq(message_id))
                .select(DbMessage::as_select())
                .first::<DbMessage>(&mut conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(|m| m.to_record())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_attachments(
        &self,
        message_id: i64,
    ) -> Result<Vec<AttachmentRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = attachments::table
                .filter(attachments::message_id.eq(message_id))
                .order(attachments::attachment_id.asc())
                .select(DbAttachment::as_select())
                .load::<DbAttachment>(&mut conn)
                .map_err(map_diesel_error)?;
            Ok(rows.iter().map(|a| a.to_record()).collect())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn record_edit(&self, edit: &MessageEdit) -> Result<(), DatabaseError> {
        let edit = edit.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let edited_at = datetime_to_string(&edit.edited_at);

            // History row and live-row refresh are one logical operation.
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let new_edit = NewMessageEdit {
                    message_id: edit.message_id,
                    old_content: edit.old_content.as_deref(),
                    new_content: &edit.new_content,
                    edited_at: edited_at.clone(),
                };

                diesel::insert_into(message_edits::table)
                    .values(&new_edit)
                    .execute(conn)?;

                diesel::update(
                    messages::table.filter(messages::message_id.eq(edit.message_id)),
                )
                .set((
                    messages::content.eq(&edit.new_content),
                    messages::edited_at.eq(Some(edited_at.clone())),
                ))
                .execute(conn)?;
                Ok(())
            })
            .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_edits(
        &self,
        message_id: i64,
    ) -> Result<Vec<MessageEditRecord>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let rows = message_edits::table
                .filter(message_edits::message_id.eq(message_id))
                .order(message_edits::id.asc())
                .select(DbMessageEdit::as_select())
                .load::<DbMessageEdit>(&mut conn)
                .map_err(map_diesel_error)?;
            rows.iter().map(|e| e.to_record()).collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn record_deletion(&self, tombstone: &MessageTombstone) -> Result<(), DatabaseError> {
        let tombstone = tombstone.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_tombstone = NewDeletedMessage {
                message_id: tombstone.message_id,
                channel_id: tombstone.channel_id,
                guild_id: tombstone.guild_id,
                user_id: tombstone.user_id,
                content: &tombstone.content,
                deleted_at: datetime_to_string(&tombstone.deleted_at),
                original_created_at: opt_datetime_to_string(
                    tombstone.original_created_at.as_ref(),
                ),
            };

            // Double-delete observations are expected; first write wins.
            diesel::insert_into(deleted_messages::table)
                .values(&new_tombstone)
                .on_conflict(deleted_messages::message_id)
                .do_nothing()
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_deletion(
        &self,
        message_id: i64,
    ) -> Result<Option<MessageTombstone>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            deleted_messages::table
                .filter(deleted_messages::message_id.eq(message_id))
                .select(DbDeletedMessage::as_select())
                .first::<DbDeletedMessage>(&mut conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(|t| t.to_tombstone())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn upsert_reaction(&self, reaction: &ReactionSnapshot) -> Result<(), DatabaseError> {
        let reaction = reaction.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let created_at = datetime_to_string(&reaction.created_at);

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                upsert_user_tx(conn, &reaction.user)?;

                let new_reaction = NewReaction {
                    message_id: reaction.message_id,
                    user_id: reaction.user.id,
                    emoji_name: &reaction.emoji_name,
                    emoji_id: reaction.emoji_id,
                    emoji_animated: reaction.emoji_animated,
                    created_at: created_at.clone(),
                };

                // Re-observing the same (message, user, emoji) tuple
                // refreshes the timestamp instead of adding a row.
                diesel::insert_into(reactions::table)
                    .values(&new_reaction)
                    .on_conflict((
                        reactions::message_id,
                        reactions::user_id,
                        reactions::emoji_name,
                    ))
                    .do_update()
                    .set(reactions::created_at.eq(created_at.clone()))
                    .execute(conn)?;
                Ok(())
            })
            .map_err(map_diesel_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteStatsStore {
    db_path: Arc<String>,
}

impl SqliteStatsStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

#[async_trait]
impl super::StatsStore for SqliteStatsStore {
    async fn guild_stats(&self, guild_id: i64) -> Result<GuildStats, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;

            let message_count: i64 = messages::table
                .filter(messages::guild_id.eq(guild_id))
                .count()
                .get_result(&mut conn)
                .map_err(map_diesel_error)?;

            let user_count: i64 = users::table
                .count()
                .get_result(&mut conn)
                .map_err(map_diesel_error)?;

            let channel_count: i64 = channels::table
                .filter(channels::guild_id.eq(guild_id))
                .count()
                .get_result(&mut conn)
                .map_err(map_diesel_error)?;

            let reaction_count = diesel::sql_query(
                "SELECT COUNT(*) AS count FROM reactions r \
                 JOIN messages m ON r.message_id = m.message_id \
                 WHERE m.guild_id = ?",
            )
            .bind::<diesel::sql_types::BigInt, _>(guild_id)
            .get_result::<CountRow>(&mut conn)
            .map_err(map_diesel_error)?
            .count;

            Ok(GuildStats {
                messages: message_count,
                users: user_count,
                channels: channel_count,
                reactions: reaction_count,
            })
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::NamedTempFile;

    use crate::db::DatabaseError;
    use crate::db::models::{MessageEdit, MessageTombstone};
    use crate::db::testutil::{
        attachment_snapshot, guild_snapshot, member_snapshot, message_snapshot, open_manager,
        reaction_snapshot, text_channel_snapshot, user_snapshot,
    };

    #[test]
    fn locked_database_errors_are_retryable() {
        use diesel::result::{DatabaseErrorKind, Error};

        for message in ["database is locked", "database table is locked"] {
            let err = super::map_diesel_error(Error::DatabaseError(
                DatabaseErrorKind::Unknown,
                Box::new(message.to_string()),
            ));
            assert!(
                matches!(err, DatabaseError::Connection(_)),
                "{message:?} mapped to {err:?}"
            );
            assert!(err.is_retryable(), "{message:?} must reach the retry path");
        }
    }

    #[test]
    fn violation_errors_stay_permanent() {
        use diesel::result::{DatabaseErrorKind, Error};

        let constraint = super::map_diesel_error(Error::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new("FOREIGN KEY constraint failed".to_string()),
        ));
        assert!(matches!(constraint, DatabaseError::Constraint(_)));
        assert!(!constraint.is_retryable());

        let query = super::map_diesel_error(Error::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("no such table: guilds".to_string()),
        ));
        assert!(matches!(query, DatabaseError::Query(_)));
        assert!(!query.is_retryable());
    }

    #[tokio::test]
    async fn message_upsert_is_idempotent_and_writes_attachments() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        db.guild_store()
            .upsert_guild(&guild_snapshot(100))
            .await
            .expect("guild");
        db.guild_store()
            .upsert_channel(&text_channel_snapshot(10, 100))
            .await
            .expect("channel");

        let mut message = message_snapshot(1, 10, 100, 7, "hi");
        message.attachments.push(attachment_snapshot(900, "photo.png"));

        db.message_store()
            .upsert_message(&message)
            .await
            .expect("first write");
        message.content = "hi (observed again)".to_string();
        db.message_store()
            .upsert_message(&message)
            .await
            .expect("second write");

        let stored = db
            .message_store()
            .get_message(1)
            .await
            .expect("query")
            .expect("message exists");
        assert_eq!(stored.content, "hi (observed again)");
        assert_eq!(stored.channel_id, 10);

        let stats = db.stats_store().guild_stats(100).await.expect("stats");
        assert_eq!(stats.messages, 1);

        let attachments = db
            .message_store()
            .list_attachments(1)
            .await
            .expect("attachments");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "photo.png");
    }

    #[tokio::test]
    async fn member_upsert_cascades_user_creation() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        db.guild_store()
            .upsert_guild(&guild_snapshot(100))
            .await
            .expect("guild");

        let member = member_snapshot(100, 7);
        db.user_store().upsert_member(&member).await.expect("member");

        let user = db
            .user_store()
            .get_user(7)
            .await
            .expect("query user")
            .expect("user row created as side effect");
        assert_eq!(user.id, 7);

        let stored = db
            .user_store()
            .get_member(100, 7)
            .await
            .expect("query member")
            .expect("membership row exists");
        assert_eq!(stored.guild_id, 100);
        assert_eq!(stored.roles, member.roles);
    }

    #[tokio::test]
    async fn user_first_seen_is_never_overwritten() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        let mut user = user_snapshot(7);
        db.user_store().upsert_user(&user).await.expect("first");
        let first = db
            .user_store()
            .get_user(7)
            .await
            .expect("query")
            .expect("exists");

        user.username = "renamed".to_string();
        db.user_store().upsert_user(&user).await.expect("second");
        let second = db
            .user_store()
            .get_user(7)
            .await
            .expect("query")
            .expect("exists");

        assert_eq!(second.username, "renamed");
        assert_eq!(second.first_seen, first.first_seen);
    }

    #[tokio::test]
    async fn message_for_unknown_channel_fails_with_constraint() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        // Strict ordering policy: parents come from resync or channel
        // events, never synthesized from a message.
        let message = message_snapshot(1, 9999, 8888, 7, "orphan");
        let err = db
            .message_store()
            .upsert_message(&message)
            .await
            .expect_err("write must be rejected");
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");

        assert!(
            db.message_store()
                .get_message(1)
                .await
                .expect("query")
                .is_none(),
            "rolled back transaction must not leave partial rows"
        );
    }

    #[tokio::test]
    async fn deletion_keeps_live_row_and_tolerates_double_delete() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        db.guild_store()
            .upsert_guild(&guild_snapshot(100))
            .await
            .expect("guild");
        db.guild_store()
            .upsert_channel(&text_channel_snapshot(10, 100))
            .await
            .expect("channel");
        let message = message_snapshot(1, 10, 100, 7, "soon gone");
        db.message_store()
            .upsert_message(&message)
            .await
            .expect("message");

        let tombstone = MessageTombstone {
            message_id: 1,
            channel_id: 10,
            guild_id: 100,
            user_id: 7,
            content: "soon gone".to_string(),
            deleted_at: Utc::now(),
            original_created_at: Some(message.created_at),
        };
        db.message_store()
            .record_deletion(&tombstone)
            .await
            .expect("first delete");
        db.message_store()
            .record_deletion(&tombstone)
            .await
            .expect("double delete is not an error");

        let live = db
            .message_store()
            .get_message(1)
            .await
            .expect("query")
            .expect("live row retained for audit");
        assert_eq!(live.content, "soon gone");

        let stored = db
            .message_store()
            .get_deletion(1)
            .await
            .expect("query tombstone")
            .expect("tombstone exists");
        assert_eq!(stored.content, "soon gone");
    }

    #[tokio::test]
    async fn edits_accumulate_and_refresh_live_content() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        db.guild_store()
            .upsert_guild(&guild_snapshot(100))
            .await
            .expect("guild");
        db.guild_store()
            .upsert_channel(&text_channel_snapshot(10, 100))
            .await
            .expect("channel");
        db.message_store()
            .upsert_message(&message_snapshot(1, 10, 100, 7, "v1"))
            .await
            .expect("message");

        db.message_store()
            .record_edit(&MessageEdit {
                message_id: 1,
                old_content: Some("v1".to_string()),
                new_content: "v2".to_string(),
                edited_at: Utc::now(),
            })
            .await
            .expect("first edit");
        db.message_store()
            .record_edit(&MessageEdit {
                message_id: 1,
                old_content: None,
                new_content: "v3".to_string(),
                edited_at: Utc::now(),
            })
            .await
            .expect("second edit");

        let edits = db.message_store().list_edits(1).await.expect("edits");
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].old_content.as_deref(), Some("v1"));
        assert_eq!(edits[1].old_content, None);
        assert_eq!(edits[1].new_content, "v3");

        let live = db
            .message_store()
            .get_message(1)
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(live.content, "v3");
        assert!(live.edited_at.is_some());
    }

    #[tokio::test]
    async fn edit_for_unknown_message_fails_with_constraint() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        let err = db
            .message_store()
            .record_edit(&MessageEdit {
                message_id: 424242,
                old_content: None,
                new_content: "ghost".to_string(),
                edited_at: Utc::now(),
            })
            .await
            .expect_err("edit for unmirrored message is rejected");
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn duplicate_reaction_refreshes_instead_of_duplicating() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = open_manager(&file).await;

        db.guild_store()
            .upsert_guild(&guild_snapshot(100))
            .await
            .expect("guild");
        db.guild_store()
            .upsert_channel(&text_channel_snapshot(10, 100))
            .await
            .expect("channel");
        db.message_store()
            .upsert_message(&message_snapshot(1, 10, 100, 7, "react to me"))
            .await
            .expect("message");

        let reaction = reaction_snapshot(1, 8, "👍");
        db.message_store()
            .upsert_reaction(&reaction)
            .await
            .expect("first reaction");
        db.message_store()
            .upsert_reaction(&reaction)
            .await
            .expect("re-observed reaction");

        let stats = db.stats_store().guild_stats(100).await.expect("stats");
        assert_eq!(stats.reactions, 1);

        let reactor = db
            .user_store()
            .get_user(8)
            .await
            .expect("query reactor")
            .expect("reacting user row created as side effect");
        assert_eq!(reactor.id, 8);
    }
}
