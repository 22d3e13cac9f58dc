use std::sync::Arc;
use tracing::{debug, info};

use crate::db::models::GuildSyncSnapshot;
use crate::db::{DatabaseError, DatabaseManager, RetryPolicy, with_retry};

/// Per-entity counts from one full resync, echoed back to the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub categories: usize,
    pub channels: usize,
    pub skipped_channels: usize,
    pub members: usize,
}

/// Drives a full guild walk through the store in dependency order:
/// guild, then categories, then channels, then members. Every write is
/// idempotent, so the walk can run on every startup and on demand.
pub struct GuildSyncer {
    db: Arc<DatabaseManager>,
    retry: RetryPolicy,
}

impl GuildSyncer {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self {
            db,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(db: Arc<DatabaseManager>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    pub async fn sync_guild(
        &self,
        snapshot: &GuildSyncSnapshot,
    ) -> Result<SyncReport, DatabaseError> {
        let guild_id = snapshot.guild.id;
        info!(guild_id, guild_name = %snapshot.guild.name, "starting full guild sync");

        let guild_store = self.db.guild_store();
        let user_store = self.db.user_store();
        let mut report = SyncReport::default();

        with_retry(self.retry, || guild_store.upsert_guild(&snapshot.guild)).await?;

        for category in &snapshot.categories {
            with_retry(self.retry, || guild_store.upsert_category(category)).await?;
            report.categories += 1;
        }

        for channel in &snapshot.channels {
            if !channel.kind.is_persistable() {
                debug!(
                    channel_id = channel.id,
                    kind = channel.kind.as_str(),
                    "skipping channel of unmirrored kind"
                );
                report.skipped_channels += 1;
                continue;
            }
            with_retry(self.retry, || guild_store.upsert_channel(channel)).await?;
            report.channels += 1;
        }

        for member in &snapshot.members {
            with_retry(self.retry, || user_store.upsert_member(member)).await?;
            report.members += 1;
        }

        info!(
            guild_id,
            categories = report.categories,
            channels = report.channels,
            skipped = report.skipped_channels,
            members = report.members,
            "guild sync finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    use crate::db::models::{ChannelKind, GuildSyncSnapshot};
    use crate::db::testutil::{
        category_snapshot, channel_snapshot, guild_snapshot, member_snapshot, open_manager,
    };

    use super::*;

    fn snapshot_with_mixed_channels() -> GuildSyncSnapshot {
        GuildSyncSnapshot {
            guild: guild_snapshot(100),
            categories: vec![category_snapshot(50, 100), category_snapshot(51, 100)],
            channels: vec![
                channel_snapshot(10, 100, ChannelKind::Text),
                channel_snapshot(11, 100, ChannelKind::Voice),
                channel_snapshot(12, 100, ChannelKind::Thread),
                channel_snapshot(13, 100, ChannelKind::Stage),
            ],
            members: vec![member_snapshot(100, 7), member_snapshot(100, 8)],
        }
    }

    #[tokio::test]
    async fn sync_persists_every_entity_and_skips_unmirrored_kinds() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = Arc::new(open_manager(&file).await);
        let syncer = GuildSyncer::new(db.clone());

        let report = syncer
            .sync_guild(&snapshot_with_mixed_channels())
            .await
            .expect("sync");

        assert_eq!(
            report,
            SyncReport {
                categories: 2,
                channels: 2,
                skipped_channels: 2,
                members: 2,
            }
        );

        let guild = db
            .guild_store()
            .get_guild(100)
            .await
            .expect("query")
            .expect("guild mirrored");
        assert_eq!(guild.name, "guild-100");

        let stats = db.stats_store().guild_stats(100).await.expect("stats");
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.users, 2);

        for user_id in [7, 8] {
            assert!(
                db.user_store()
                    .get_member(100, user_id)
                    .await
                    .expect("query")
                    .is_some(),
                "membership row for user {user_id}"
            );
        }
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = Arc::new(open_manager(&file).await);
        let syncer = GuildSyncer::new(db.clone());
        let snapshot = snapshot_with_mixed_channels();

        let first = syncer.sync_guild(&snapshot).await.expect("first sync");
        let second = syncer.sync_guild(&snapshot).await.expect("second sync");
        assert_eq!(first, second);

        let stats = db.stats_store().guild_stats(100).await.expect("stats");
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.users, 2);
    }
}
