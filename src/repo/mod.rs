mod announcements;
mod users;

#[cfg(test)]
pub(crate) mod test;

use std::str::FromStr;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use teloxide::types::{ChatId, MessageId, UserId};
pub use announcements::*;
pub use users::*;
use crate::config::DatabaseConfig;
use crate::domain::{AcknowledgmentRecord, Announcement, AnnouncementId, NewAnnouncement, PendingReminder, Recipient, RecipientId};

/// Durable state of announcements, their recipients and acknowledgments.
///
/// Every method may fail with a storage error, which must be propagated to the caller.
#[async_trait]
pub trait AcknowledgmentStore: Send + Sync {
    /// Persists the announcement together with its recipients in one transaction.
    /// A recipient that already exists for the announcement is skipped, not duplicated.
    async fn create_announcement(&self, announcement: NewAnnouncement, recipients: &[UserId]) -> anyhow::Result<(Announcement, Vec<Recipient>)>;

    async fn find_announcement(&self, id: AnnouncementId) -> anyhow::Result<Option<Announcement>>;

    /// `None` means the message is not a tracked announcement.
    async fn find_announcement_by_source_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<Option<Announcement>>;

    async fn find_recipient(&self, announcement_id: AnnouncementId, uid: UserId) -> anyhow::Result<Option<Recipient>>;

    async fn has_acknowledgment(&self, recipient_id: RecipientId) -> anyhow::Result<bool>;

    /// Returns `None` if the recipient has been acknowledged already.
    async fn record_acknowledgment(&self, recipient_id: RecipientId, timestamp: DateTime<Utc>) -> anyhow::Result<Option<AcknowledgmentRecord>>;

    async fn count_recipients(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32>;

    async fn count_acknowledged(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32>;

    /// Marks the announcement as completed if every recipient has acknowledged it and it hasn't
    /// been marked yet. Returns `true` only for the call that set the mark.
    async fn mark_completed(&self, announcement_id: AnnouncementId, timestamp: DateTime<Utc>) -> anyhow::Result<bool>;

    async fn pending_reminders(&self) -> anyhow::Result<Vec<PendingReminder>>;
}

#[derive(Clone)]
pub struct Repositories {
    pub announcements: Announcements,
    pub users: Users,
}

impl Repositories {
    pub fn new(db_conn: &Pool<Postgres>) -> Self {
        Self {
            announcements: Announcements::new(db_conn.clone()),
            users: Users::new(db_conn.clone()),
        }
    }
}

pub async fn establish_database_connection(config: &DatabaseConfig) -> Result<Pool<Postgres>, anyhow::Error> {
    let statement_timeout = config.timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(config.url.as_str())?
        .options([("statement_timeout", statement_timeout)]);
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.timeout)
        .connect_with(options).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

#[macro_export]
macro_rules! repository {
    ($name:ident, $($methods:item),*) => {
        #[derive(Clone)]
        pub struct $name {
            pool: sqlx::Pool<sqlx::Postgres>,
        }

        impl $name {
            pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
                Self { pool }
            }

            $($methods)*
        }
    };
}
