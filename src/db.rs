pub mod error;
pub mod manager;
pub mod models;
pub mod retry;
pub(crate) mod schema_sqlite;
pub mod sqlite;
pub mod stores;
#[cfg(test)]
pub(crate) mod testutil;

pub use error::DatabaseError;
pub use manager::DatabaseManager;
pub use retry::{RetryPolicy, with_retry};
pub use stores::{GuildStore, MessageStore, StatsStore, UserStore};
