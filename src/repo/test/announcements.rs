use chrono::Utc;
use teloxide::types::{ChatId, MessageId, UserId};
use testcontainers::clients;
use crate::domain::NewAnnouncement;
use crate::repo;
use crate::repo::AcknowledgmentStore;
use crate::repo::test::{start_postgres, CHAT_ID, MESSAGE_ID, OWNER_UID};

#[tokio::test]
#[ignore]
async fn test_all() {
    let docker = clients::Cli::default();
    let (_container, db) = start_postgres(&docker).await;
    let announcements = repo::Announcements::new(db.clone());
    let (chat_id, message_id) = (ChatId(CHAT_ID), MessageId(MESSAGE_ID));

    let recipients = [UserId(1), UserId(2), UserId(1)];
    let (announcement, created) = announcements.create_announcement(new_announcement(), &recipients)
        .await.expect("couldn't create an announcement");
    assert_eq!(announcement.text, "test");
    assert_eq!(announcement.owner, UserId(OWNER_UID));
    // the repeated recipient is skipped by the unique constraint
    assert_eq!(created.len(), 2);

    let found = announcements.find_announcement_by_source_message(chat_id, message_id)
        .await.expect("couldn't find the announcement by its message")
        .expect("the announcement must exist");
    assert_eq!(found, announcement);
    let found = announcements.find_announcement(announcement.id)
        .await.expect("couldn't find the announcement by id");
    assert_eq!(found, Some(announcement.clone()));
    let untracked = announcements.find_announcement_by_source_message(chat_id, MessageId(MESSAGE_ID + 1))
        .await.expect("couldn't look up an untracked message");
    assert!(untracked.is_none());

    let recipient = announcements.find_recipient(announcement.id, UserId(2))
        .await.expect("couldn't find the recipient")
        .expect("the recipient must exist");
    assert_eq!(recipient.uid, UserId(2));
    let stranger = announcements.find_recipient(announcement.id, UserId(OWNER_UID))
        .await.expect("couldn't look up the owner");
    assert!(stranger.is_none());

    assert_eq!(announcements.count_recipients(announcement.id).await.expect("couldn't count recipients"), 2);
    assert_eq!(announcements.count_acknowledged(announcement.id).await.expect("couldn't count acknowledgments"), 0);
    assert!(!announcements.has_acknowledgment(recipient.id).await.expect("couldn't check the acknowledgment"));
    assert_eq!(announcements.pending_reminders().await.expect("couldn't fetch pending reminders").len(), 2);

    let record = announcements.record_acknowledgment(recipient.id, Utc::now())
        .await.expect("couldn't record the acknowledgment");
    assert!(record.is_some_and(|r| r.recipient_id == recipient.id));
    let duplicate = announcements.record_acknowledgment(recipient.id, Utc::now())
        .await.expect("the duplicate must be a benign conflict");
    assert!(duplicate.is_none());

    assert!(announcements.has_acknowledgment(recipient.id).await.expect("couldn't check the acknowledgment again"));
    assert_eq!(announcements.count_acknowledged(announcement.id).await.expect("couldn't count acknowledgments again"), 1);
    let pending = announcements.pending_reminders()
        .await.expect("couldn't fetch pending reminders again");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].uid, UserId(1));
    assert_eq!(pending[0].announcement_id, announcement.id);

    assert!(!announcements.mark_completed(announcement.id, Utc::now())
        .await.expect("couldn't check the completion"));
    announcements.record_acknowledgment(pending[0].recipient_id, Utc::now())
        .await.expect("couldn't record the last acknowledgment");
    assert!(announcements.mark_completed(announcement.id, Utc::now())
        .await.expect("couldn't mark the completion"));
    assert!(!announcements.mark_completed(announcement.id, Utc::now())
        .await.expect("couldn't check the completion again"));
}

#[tokio::test]
#[ignore]
async fn test_duplicate_source_message_is_rejected() {
    let docker = clients::Cli::default();
    let (_container, db) = start_postgres(&docker).await;
    let announcements = repo::Announcements::new(db.clone());

    announcements.create_announcement(new_announcement(), &[UserId(1)])
        .await.expect("couldn't create an announcement");
    let res = announcements.create_announcement(new_announcement(), &[UserId(2)]).await;
    assert!(res.is_err());

    // the failed transaction must not leave the second recipient behind
    assert!(announcements.pending_reminders().await
        .expect("couldn't fetch pending reminders")
        .iter()
        .all(|p| p.uid == UserId(1)));
}

fn new_announcement() -> NewAnnouncement {
    NewAnnouncement::new(UserId(OWNER_UID), ChatId(CHAT_ID), MessageId(MESSAGE_ID), "test".to_owned(), "en".to_owned())
}
