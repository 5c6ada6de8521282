use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, MessageId, UserId};
use crate::domain::{AcknowledgmentId, AnnouncementId, RecipientId};

/// A broadcast message posted on behalf of its owner. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub owner: UserId,
    pub chat_id: ChatId,
    /// Identity of the posted message; acknowledgments are correlated by `(chat_id, message_id)`.
    pub message_id: MessageId,
    pub text: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, derive_more::Constructor)]
pub struct NewAnnouncement {
    pub owner: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub language: String,
}

/// An obligation of one user to acknowledge one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    pub id: RecipientId,
    pub announcement_id: AnnouncementId,
    pub uid: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct AcknowledgmentRecord {
    pub id: AcknowledgmentId,
    pub recipient_id: RecipientId,
    pub acknowledged_at: DateTime<Utc>,
}

/// A recipient who has not acknowledged yet, i.e. someone who still has to be reminded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReminder {
    pub announcement_id: AnnouncementId,
    pub recipient_id: RecipientId,
    pub uid: UserId,
}
