mod locks;


use std::ops::Range;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, Error};
use rust_i18n::t;
use teloxide::types::{ChatId, MessageId, UserId};
use teloxide::utils::html;

pub use locks::AnnouncementLocks;
use crate::domain::{distinct_recipients, strip_mentions, Announcement, AnnouncementId, JobKey, LanguageCode, NewAnnouncement, Recipient, RecipientId, ValidationError};
use crate::messenger::Messenger;
use crate::metrics;
use crate::repo::AcknowledgmentStore;
use crate::scheduler::{DailyTrigger, ReminderHandler, ReminderPayload, ReminderScheduler};

#[derive(Debug, Clone)]
pub struct AnnouncementRequest {
    pub owner: UserId,
    pub chat_id: ChatId,
    /// Text of the command with the command token and the mentions still in it.
    pub raw_text: String,
    /// Byte ranges of `raw_text` to cut out of the announcement's body.
    pub mention_spans: Vec<Range<usize>>,
    /// Mentioned users in the order of their first mention. May contain the owner and repeats.
    pub recipients: Vec<UserId>,
    pub language: LanguageCode,
}

#[derive(Debug, Clone)]
pub struct CreatedAnnouncement {
    pub announcement: Announcement,
    pub recipients: Vec<UserId>,
}

#[derive(Debug, Display, Error)]
pub enum CreateAnnouncementError {
    #[display("invalid announcement: {_0}")]
    Validation(ValidationError),
    #[display("couldn't post the announcement: {_0}")]
    Messaging(#[error(not(source))] anyhow::Error),
    #[display("couldn't save the announcement: {_0}")]
    Storage(#[error(not(source))] anyhow::Error),
}

impl From<ValidationError> for CreateAnnouncementError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// A user has confirmed they've read the message `(chat_id, message_id)`.
#[derive(Debug, Copy, Clone, Constructor)]
pub struct AcknowledgmentEvent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub uid: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcknowledgmentOutcome {
    /// The message isn't an announcement.
    Untracked,
    NotARecipient,
    AlreadyAcknowledged,
    /// `completed` is true for the one acknowledgment which made the announcement fully read.
    /// A retried event that completes the announcement is reported as `AlreadyAcknowledged`.
    Acknowledged { completed: bool },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Sent,
    AlreadyAcknowledged,
    AnnouncementGone,
}

pub struct AcknowledgmentCoordinator {
    store: Arc<dyn AcknowledgmentStore>,
    scheduler: ReminderScheduler,
    messenger: Arc<dyn Messenger>,
    trigger: DailyTrigger,
    locks: AnnouncementLocks,
}

impl AcknowledgmentCoordinator {
    pub fn new(store: Arc<dyn AcknowledgmentStore>, scheduler: ReminderScheduler,
               messenger: Arc<dyn Messenger>, trigger: DailyTrigger) -> Self {
        Self { store, scheduler, messenger, trigger, locks: AnnouncementLocks::default() }
    }

    pub async fn create_announcement(&self, request: AnnouncementRequest) -> Result<CreatedAnnouncement, CreateAnnouncementError> {
        let recipients = distinct_recipients(request.owner, request.recipients);
        if recipients.is_empty() {
            return Err(ValidationError::NoRecipients.into())
        }
        let body = strip_mentions(&request.raw_text, &request.mention_spans);
        if body.is_empty() {
            return Err(ValidationError::EmptyBody.into())
        }

        let language = request.language.as_str().to_owned();
        let message_id = self.messenger.post_announcement(request.chat_id, &html::escape(&body), &language)
            .await
            .map_err(CreateAnnouncementError::Messaging)?;

        let new_announcement = NewAnnouncement::new(request.owner, request.chat_id, message_id, body, language);
        let (announcement, created_recipients) = match self.store.create_announcement(new_announcement, &recipients).await {
            Ok(created) => created,
            Err(err) => {
                if let Err(retract_err) = self.messenger.retract(request.chat_id, message_id).await {
                    log::warn!("couldn't retract the unsaved announcement ({}:{}): {retract_err}", request.chat_id, message_id);
                }
                return Err(CreateAnnouncementError::Storage(err))
            }
        };

        for recipient in created_recipients.iter() {
            self.schedule_reminder(recipient.announcement_id, recipient.id, recipient.uid);
        }
        metrics::ANNOUNCEMENTS_COUNTER.inc();
        log::info!("the announcement {} was created in {} with {} recipients", announcement.id, announcement.chat_id, created_recipients.len());

        Ok(CreatedAnnouncement {
            announcement,
            recipients: created_recipients.into_iter()
                .map(|Recipient { uid, .. }| uid)
                .collect(),
        })
    }

    pub async fn on_acknowledgment_event(&self, event: AcknowledgmentEvent) -> anyhow::Result<AcknowledgmentOutcome> {
        let Some(announcement) = self.store.find_announcement_by_source_message(event.chat_id, event.message_id).await? else {
            log::debug!("{}:{} is not an announcement", event.chat_id, event.message_id);
            return Ok(AcknowledgmentOutcome::Untracked)
        };

        let _guard = self.locks.lock(announcement.id).await;

        let Some(recipient) = self.store.find_recipient(announcement.id, event.uid).await? else {
            log::debug!("{} is not a recipient of the announcement {}", event.uid, announcement.id);
            return Ok(AcknowledgmentOutcome::NotARecipient)
        };

        let maybe_record = self.store.record_acknowledgment(recipient.id, event.timestamp).await?;
        self.scheduler.cancel(&JobKey::new(announcement.id, recipient.id));
        let Some(record) = maybe_record else {
            log::debug!("{} has acknowledged the announcement {} already", event.uid, announcement.id);
            // a previous attempt may have failed between the record and the completion check
            if self.store.mark_completed(announcement.id, event.timestamp).await? {
                self.notify_completion(&announcement).await;
            }
            return Ok(AcknowledgmentOutcome::AlreadyAcknowledged)
        };
        metrics::ACKNOWLEDGMENTS_COUNTER.inc();

        let total = self.store.count_recipients(announcement.id).await?;
        let acknowledged = self.store.count_acknowledged(announcement.id).await?;
        log::info!("the announcement {} was acknowledged by {} at {} ({acknowledged}/{total})",
            announcement.id, event.uid, record.acknowledged_at);

        let completed = self.store.mark_completed(announcement.id, event.timestamp).await?;
        if completed {
            self.notify_completion(&announcement).await;
        }
        Ok(AcknowledgmentOutcome::Acknowledged { completed })
    }

    /// Sends a reminder unless the recipient has acknowledged the announcement in the meantime.
    /// The job itself is left in place, so the recipient is reminded again the next day.
    pub async fn fire_reminder(&self, payload: ReminderPayload) -> anyhow::Result<ReminderOutcome> {
        let key = payload.job_key();
        let Some(announcement) = self.store.find_announcement(payload.announcement_id).await? else {
            log::warn!("the announcement of {key} doesn't exist anymore");
            self.scheduler.cancel(&key);
            return Ok(ReminderOutcome::AnnouncementGone)
        };
        if self.store.has_acknowledgment(payload.recipient_id).await? {
            log::debug!("{key} is stale, {} has acknowledged the announcement already", payload.uid);
            self.scheduler.cancel(&key);
            return Ok(ReminderOutcome::AlreadyAcknowledged)
        }

        let body = html::escape(&announcement.text);
        let text = t!("reminder.text", locale = announcement.language.as_str(), text = body).to_string();
        self.messenger.send_direct(payload.uid, &text).await?;
        metrics::REMINDERS_COUNTER.inc();
        log::info!("{} was reminded about the announcement {}", payload.uid, announcement.id);
        Ok(ReminderOutcome::Sent)
    }

    /// Registers a job for every recipient who hasn't acknowledged yet. Jobs are kept in memory
    /// only, so this must be called after each start of the process.
    pub async fn restore_pending_reminders(&self) -> anyhow::Result<usize> {
        let pending = self.store.pending_reminders().await?;
        for reminder in pending.iter() {
            self.schedule_reminder(reminder.announcement_id, reminder.recipient_id, reminder.uid);
        }
        log::info!("{} pending reminders were restored", pending.len());
        Ok(pending.len())
    }

    fn schedule_reminder(&self, announcement_id: AnnouncementId, recipient_id: RecipientId, uid: UserId) {
        let payload = ReminderPayload { announcement_id, recipient_id, uid };
        if let Err(err) = self.scheduler.schedule(payload.job_key(), self.trigger, payload) {
            log::error!("couldn't schedule {}: {err}", payload.job_key());
        }
    }

    async fn notify_completion(&self, announcement: &Announcement) {
        let text = t!("announcement.completed", locale = announcement.language.as_str()).to_string();
        match self.messenger.post_in_thread(announcement.chat_id, announcement.message_id, &text).await {
            Ok(()) => {
                metrics::COMPLETIONS_COUNTER.inc();
                log::info!("the announcement {} has been read by everyone", announcement.id);
            }
            Err(err) => log::error!("couldn't post the completion notice of the announcement {}: {err}", announcement.id),
        }
    }
}

#[async_trait]
impl ReminderHandler for AcknowledgmentCoordinator {
    async fn fire_reminder(&self, payload: ReminderPayload) -> anyhow::Result<()> {
        let outcome = AcknowledgmentCoordinator::fire_reminder(self, payload).await?;
        log::debug!("{}: {outcome:?}", payload.job_key());
        Ok(())
    }
}
