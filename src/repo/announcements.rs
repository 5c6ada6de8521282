use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use sqlx::{Pool, Postgres};
use teloxide::types::{ChatId, MessageId, UserId};
use crate::domain::{AcknowledgmentRecord, Announcement, AnnouncementId, NewAnnouncement, PendingReminder, Recipient, RecipientId};
use crate::repo::AcknowledgmentStore;

const ANNOUNCEMENT_COLUMNS: &str = "id, owner_uid, chat_id, message_id, text, language, created_at";

#[derive(sqlx::FromRow)]
struct AnnouncementEntity {
    id: AnnouncementId,
    owner_uid: i64,
    chat_id: i64,
    message_id: i32,
    text: String,
    language: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AnnouncementEntity> for Announcement {
    type Error = std::num::TryFromIntError;

    fn try_from(value: AnnouncementEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            owner: UserId(value.owner_uid.try_into()?),
            chat_id: ChatId(value.chat_id),
            message_id: MessageId(value.message_id),
            text: value.text,
            language: value.language,
            created_at: value.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecipientEntity {
    id: RecipientId,
    announcement_id: AnnouncementId,
    uid: i64,
}

impl TryFrom<RecipientEntity> for Recipient {
    type Error = std::num::TryFromIntError;

    fn try_from(value: RecipientEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            announcement_id: value.announcement_id,
            uid: UserId(value.uid.try_into()?),
        })
    }
}

impl TryFrom<RecipientEntity> for PendingReminder {
    type Error = std::num::TryFromIntError;

    fn try_from(value: RecipientEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            announcement_id: value.announcement_id,
            recipient_id: value.id,
            uid: UserId(value.uid.try_into()?),
        })
    }
}

/// PostgreSQL backed acknowledgment store. Uniqueness of recipients per announcement and
/// of acknowledgments per recipient is guaranteed by constraints of the schema.
#[derive(Clone, Constructor)]
pub struct Announcements {
    pool: Pool<Postgres>,
}

#[async_trait]
impl AcknowledgmentStore for Announcements {
    async fn create_announcement(&self, announcement: NewAnnouncement, recipients: &[UserId]) -> anyhow::Result<(Announcement, Vec<Recipient>)> {
        let mut tx = self.pool.begin().await?;
        let owner_uid: i64 = announcement.owner.0.try_into()?;
        let sql = format!("INSERT INTO Announcements (owner_uid, chat_id, message_id, text, language) \
                            VALUES ($1, $2, $3, $4, $5) RETURNING {ANNOUNCEMENT_COLUMNS}");
        let created: Announcement = sqlx::query_as::<_, AnnouncementEntity>(&sql)
            .bind(owner_uid)
            .bind(announcement.chat_id.0)
            .bind(announcement.message_id.0)
            .bind(announcement.text)
            .bind(announcement.language)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        let mut created_recipients = Vec::with_capacity(recipients.len());
        for uid in recipients {
            let maybe_recipient = sqlx::query_as::<_, RecipientEntity>(
                "INSERT INTO Recipients (announcement_id, uid) VALUES ($1, $2) \
                    ON CONFLICT (announcement_id, uid) DO NOTHING \
                    RETURNING id, announcement_id, uid")
                .bind(created.id)
                .bind(i64::try_from(uid.0)?)
                .fetch_optional(&mut *tx)
                .await?;
            match maybe_recipient {
                Some(recipient) => created_recipients.push(recipient.try_into()?),
                None => log::warn!("recipient {uid} of the announcement {} already exists", created.id),
            }
        }

        tx.commit().await?;
        Ok((created, created_recipients))
    }

    async fn find_announcement(&self, id: AnnouncementId) -> anyhow::Result<Option<Announcement>> {
        let sql = format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM Announcements WHERE id = $1");
        let maybe_announcement = sqlx::query_as::<_, AnnouncementEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Announcement::try_from)
            .transpose()?;
        Ok(maybe_announcement)
    }

    async fn find_announcement_by_source_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<Option<Announcement>> {
        let sql = format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM Announcements WHERE chat_id = $1 AND message_id = $2");
        let maybe_announcement = sqlx::query_as::<_, AnnouncementEntity>(&sql)
            .bind(chat_id.0)
            .bind(message_id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Announcement::try_from)
            .transpose()?;
        Ok(maybe_announcement)
    }

    async fn find_recipient(&self, announcement_id: AnnouncementId, uid: UserId) -> anyhow::Result<Option<Recipient>> {
        let uid: i64 = uid.0.try_into()?;
        let maybe_recipient = sqlx::query_as::<_, RecipientEntity>(
            "SELECT id, announcement_id, uid FROM Recipients WHERE announcement_id = $1 AND uid = $2")
            .bind(announcement_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?
            .map(Recipient::try_from)
            .transpose()?;
        Ok(maybe_recipient)
    }

    async fn has_acknowledgment(&self, recipient_id: RecipientId) -> anyhow::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM Acknowledgments WHERE recipient_id = $1)")
            .bind(recipient_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn record_acknowledgment(&self, recipient_id: RecipientId, timestamp: DateTime<Utc>) -> anyhow::Result<Option<AcknowledgmentRecord>> {
        sqlx::query_as::<_, AcknowledgmentRecord>(
            "INSERT INTO Acknowledgments (recipient_id, acknowledged_at) VALUES ($1, $2) \
                ON CONFLICT (recipient_id) DO NOTHING \
                RETURNING id, recipient_id, acknowledged_at")
            .bind(recipient_id)
            .bind(timestamp)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn count_recipients(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32> {
        let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM Recipients WHERE announcement_id = $1")
            .bind(announcement_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.try_into()?)
    }

    async fn count_acknowledged(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM Acknowledgments a JOIN Recipients r ON a.recipient_id = r.id \
                WHERE r.announcement_id = $1")
            .bind(announcement_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.try_into()?)
    }

    async fn mark_completed(&self, announcement_id: AnnouncementId, timestamp: DateTime<Utc>) -> anyhow::Result<bool> {
        let marked = sqlx::query_scalar::<_, AnnouncementId>(
            "UPDATE Announcements SET completed_at = $2 \
                WHERE id = $1 AND completed_at IS NULL \
                    AND EXISTS (SELECT 1 FROM Recipients WHERE announcement_id = $1) \
                    AND NOT EXISTS (SELECT 1 FROM Recipients r \
                        LEFT JOIN Acknowledgments a ON a.recipient_id = r.id \
                        WHERE r.announcement_id = $1 AND a.id IS NULL) \
                RETURNING id")
            .bind(announcement_id)
            .bind(timestamp)
            .fetch_optional(&self.pool)
            .await?;
        Ok(marked.is_some())
    }

    async fn pending_reminders(&self) -> anyhow::Result<Vec<PendingReminder>> {
        sqlx::query_as::<_, RecipientEntity>(
            "SELECT r.id, r.announcement_id, r.uid FROM Recipients r \
                LEFT JOIN Acknowledgments a ON a.recipient_id = r.id \
                WHERE a.id IS NULL ORDER BY r.id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|entity| PendingReminder::try_from(entity).map_err(anyhow::Error::from))
            .collect()
    }
}
