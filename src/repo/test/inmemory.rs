use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, MessageId, UserId};
use crate::domain::{AcknowledgmentId, AcknowledgmentRecord, Announcement, AnnouncementId, NewAnnouncement, PendingReminder, Recipient, RecipientId};
use crate::repo::AcknowledgmentStore;

#[derive(Default)]
struct State {
    announcements: Vec<Announcement>,
    recipients: Vec<Recipient>,
    acknowledgments: Vec<AcknowledgmentRecord>,
    completed: Vec<AnnouncementId>,
}

/// Store with the same uniqueness rules as the PostgreSQL schema, for engine tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    failing_calls: AtomicU32,
    failing_counts: AtomicU32,
}

impl InMemoryStore {
    /// Makes every following call fail as if the database was down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst)
    }

    /// Makes the next `calls` calls of any method fail.
    pub fn fail_next_calls(&self, calls: u32) {
        self.failing_calls.store(calls, Ordering::SeqCst)
    }

    /// Makes the next `calls` calls of `count_recipients` fail.
    pub fn fail_next_counts(&self, calls: u32) {
        self.failing_counts.store(calls, Ordering::SeqCst)
    }

    pub fn acknowledgments_of(&self, recipient_id: RecipientId) -> usize {
        self.state.lock().expect("poisoned").acknowledgments.iter()
            .filter(|r| r.recipient_id == recipient_id)
            .count()
    }

    pub fn announcements_count(&self) -> usize {
        self.state.lock().expect("poisoned").announcements.len()
    }

    fn state(&self) -> anyhow::Result<std::sync::MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) || take_failure(&self.failing_calls) {
            return Err(anyhow!("the store is unavailable"))
        }
        self.state.lock().map_err(|_| anyhow!("poisoned"))
    }
}

#[async_trait]
impl AcknowledgmentStore for InMemoryStore {
    async fn create_announcement(&self, announcement: NewAnnouncement, recipients: &[UserId]) -> anyhow::Result<(Announcement, Vec<Recipient>)> {
        let mut state = self.state()?;
        let duplicate = state.announcements.iter()
            .any(|a| a.chat_id == announcement.chat_id && a.message_id == announcement.message_id);
        if duplicate {
            return Err(anyhow!("duplicate source message"))
        }

        let created = Announcement {
            id: AnnouncementId::from(state.announcements.len() as i64 + 1),
            owner: announcement.owner,
            chat_id: announcement.chat_id,
            message_id: announcement.message_id,
            text: announcement.text,
            language: announcement.language,
            created_at: Utc::now(),
        };
        state.announcements.push(created.clone());

        let mut created_recipients = Vec::new();
        for uid in recipients {
            if created_recipients.iter().any(|r: &Recipient| r.uid == *uid) {
                continue
            }
            let recipient = Recipient {
                id: RecipientId::from(state.recipients.len() as i64 + 1),
                announcement_id: created.id,
                uid: *uid,
            };
            state.recipients.push(recipient);
            created_recipients.push(recipient);
        }
        Ok((created, created_recipients))
    }

    async fn find_announcement(&self, id: AnnouncementId) -> anyhow::Result<Option<Announcement>> {
        Ok(self.state()?.announcements.iter().find(|a| a.id == id).cloned())
    }

    async fn find_announcement_by_source_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<Option<Announcement>> {
        Ok(self.state()?.announcements.iter()
            .find(|a| a.chat_id == chat_id && a.message_id == message_id)
            .cloned())
    }

    async fn find_recipient(&self, announcement_id: AnnouncementId, uid: UserId) -> anyhow::Result<Option<Recipient>> {
        Ok(self.state()?.recipients.iter()
            .find(|r| r.announcement_id == announcement_id && r.uid == uid)
            .copied())
    }

    async fn has_acknowledgment(&self, recipient_id: RecipientId) -> anyhow::Result<bool> {
        Ok(self.state()?.acknowledgments.iter().any(|r| r.recipient_id == recipient_id))
    }

    async fn record_acknowledgment(&self, recipient_id: RecipientId, timestamp: DateTime<Utc>) -> anyhow::Result<Option<AcknowledgmentRecord>> {
        let mut state = self.state()?;
        if state.acknowledgments.iter().any(|r| r.recipient_id == recipient_id) {
            return Ok(None)
        }
        let record = AcknowledgmentRecord {
            id: AcknowledgmentId::from(state.acknowledgments.len() as i64 + 1),
            recipient_id,
            acknowledged_at: timestamp,
        };
        state.acknowledgments.push(record);
        Ok(Some(record))
    }

    async fn count_recipients(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32> {
        if take_failure(&self.failing_counts) {
            return Err(anyhow!("canceling statement due to statement timeout"))
        }
        Ok(self.state()?.recipients.iter()
            .filter(|r| r.announcement_id == announcement_id)
            .count() as u32)
    }

    async fn count_acknowledged(&self, announcement_id: AnnouncementId) -> anyhow::Result<u32> {
        let state = self.state()?;
        let count = state.acknowledgments.iter()
            .filter(|ack| state.recipients.iter()
                .any(|r| r.id == ack.recipient_id && r.announcement_id == announcement_id))
            .count();
        Ok(count as u32)
    }

    async fn mark_completed(&self, announcement_id: AnnouncementId, _timestamp: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut state = self.state()?;
        if state.completed.contains(&announcement_id) {
            return Ok(false)
        }
        let mut recipients = state.recipients.iter()
            .filter(|r| r.announcement_id == announcement_id)
            .peekable();
        let has_recipients = recipients.peek().is_some();
        let all_acknowledged = recipients
            .all(|r| state.acknowledgments.iter().any(|ack| ack.recipient_id == r.id));
        if !has_recipients || !all_acknowledged {
            return Ok(false)
        }
        state.completed.push(announcement_id);
        Ok(true)
    }

    async fn pending_reminders(&self) -> anyhow::Result<Vec<PendingReminder>> {
        let state = self.state()?;
        Ok(state.recipients.iter()
            .filter(|r| !state.acknowledgments.iter().any(|ack| ack.recipient_id == r.id))
            .map(|r| PendingReminder {
                announcement_id: r.announcement_id,
                recipient_id: r.id,
                uid: r.uid,
            })
            .collect())
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok()
}
