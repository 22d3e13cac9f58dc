// SQLite schema definitions. Timestamps are RFC 3339 text; identifiers
// from the platform are 64-bit integers.

diesel::table! {
    guilds (guild_id) {
        guild_id -> BigInt,
        guild_name -> Text,
        owner_id -> Nullable<BigInt>,
        member_count -> Nullable<BigInt>,
        created_at -> Nullable<Text>,
        joined_at -> Text,
    }
}

diesel::table! {
    categories (category_id) {
        category_id -> BigInt,
        guild_id -> BigInt,
        category_name -> Text,
        position -> Integer,
        created_at -> Nullable<Text>,
    }
}

diesel::table! {
    channels (channel_id) {
        channel_id -> BigInt,
        guild_id -> BigInt,
        category_id -> Nullable<BigInt>,
        channel_name -> Text,
        channel_kind -> Text,
        position -> Integer,
        created_at -> Nullable<Text>,
    }
}

diesel::table! {
    users (user_id) {
        user_id -> BigInt,
        username -> Text,
        display_name -> Nullable<Text>,
        discriminator -> Nullable<Text>,
        bot -> Bool,
        created_at -> Nullable<Text>,
        first_seen -> Text,
    }
}

diesel::table! {
    guild_members (guild_id, user_id) {
        guild_id -> BigInt,
        user_id -> BigInt,
        nickname -> Nullable<Text>,
        joined_at -> Nullable<Text>,
        roles -> Text,
    }
}

diesel::table! {
    messages (message_id) {
        message_id -> BigInt,
        channel_id -> BigInt,
        guild_id -> BigInt,
        user_id -> BigInt,
        content -> Text,
        created_at -> Text,
        edited_at -> Nullable<Text>,
        message_kind -> Text,
        embeds -> Nullable<Text>,
        attachments -> Nullable<Text>,
    }
}

diesel::table! {
    attachments (attachment_id) {
        attachment_id -> BigInt,
        message_id -> BigInt,
        filename -> Text,
        url -> Text,
        proxy_url -> Text,
        size -> BigInt,
        content_type -> Nullable<Text>,
    }
}

diesel::table! {
    reactions (id) {
        id -> Integer,
        message_id -> BigInt,
        user_id -> BigInt,
        emoji_name -> Text,
        emoji_id -> Nullable<BigInt>,
        emoji_animated -> Bool,
        created_at -> Text,
    }
}

diesel::table! {
    message_edits (id) {
        id -> Integer,
        message_id -> BigInt,
        old_content -> Nullable<Text>,
        new_content -> Text,
        edited_at -> Text,
    }
}

diesel::table! {
    deleted_messages (message_id) {
        message_id -> BigInt,
        channel_id -> BigInt,
        guild_id -> BigInt,
        user_id -> BigInt,
        content -> Text,
        deleted_at -> Text,
        original_created_at -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    guilds,
    categories,
    channels,
    users,
    guild_members,
    messages,
    attachments,
    reactions,
    message_edits,
    deleted_messages,
);
