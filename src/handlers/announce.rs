use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use rust_i18n::t;
use teloxide::Bot;
use teloxide::macros::BotCommands;
use teloxide::types::{Message, MessageEntityKind, MessageEntityRef, UserId};
use teloxide::utils::html;
use crate::coordinator::{AcknowledgmentCoordinator, AnnouncementRequest, CreateAnnouncementError};
use crate::domain::LanguageCode;
use crate::handlers::{reply_html, HandlerResult};
use crate::{metrics, repo};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case")]
pub enum AnnounceCommands {
    #[command(description = "announce")]
    Announce(String),
    #[command(description = "read_confirm")]
    ReadConfirm(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mention {
    User { uid: UserId, name: String },
    Username(String),
}

/// Mentions of the command in the order they appear, plus the spans which must be cut out of the body.
#[derive(Debug, Default)]
struct CommandMentions {
    mentions: Vec<Mention>,
    spans: Vec<Range<usize>>,
}

fn collect_mentions(entities: &[MessageEntityRef]) -> CommandMentions {
    let mut result = CommandMentions::default();
    for entity in entities {
        let mention = match entity.kind() {
            MessageEntityKind::BotCommand if entity.start() == 0 => None,
            MessageEntityKind::TextMention { user } => Some(Mention::User {
                uid: user.id,
                name: user.full_name(),
            }),
            MessageEntityKind::Mention => Some(Mention::Username(entity.text().to_owned())),
            _ => continue,
        };
        result.spans.push(entity.range());
        result.mentions.extend(mention);
    }
    result
}

pub async fn announce_cmd_handler(bot: Bot, msg: Message, _cmd: AnnounceCommands, users: repo::Users,
                                  coordinator: Arc<AcknowledgmentCoordinator>) -> HandlerResult {
    metrics::CMD_ANNOUNCE_COUNTER.invoked();
    let from = msg.from.as_ref()
        .ok_or("unexpected absence of a FROM field for the /announce command")?;
    let lang_code = LanguageCode::from_user(from);
    users.create_or_update(from.id, from.username.as_deref(), &from.full_name()).await?;

    let raw_text = msg.text().unwrap_or_default();
    let entities = msg.parse_entities().unwrap_or_default();
    let CommandMentions { mentions, spans } = collect_mentions(&entities);

    let mut recipients = Vec::with_capacity(mentions.len());
    let mut names = HashMap::new();
    let mut unresolved = Vec::new();
    for mention in mentions {
        match mention {
            Mention::User { uid, name } => {
                names.entry(uid).or_insert_with(|| html::user_mention(uid, &html::escape(&name)));
                recipients.push(uid);
            }
            Mention::Username(username) => match users.find_by_username(&username).await? {
                Some(user) => {
                    let uid = user.user_id()?;
                    names.entry(uid).or_insert_with(|| html::escape(&username));
                    recipients.push(uid);
                }
                None => unresolved.push(html::escape(&username)),
            },
        }
    }

    let request = AnnouncementRequest {
        owner: from.id,
        chat_id: msg.chat.id,
        raw_text: raw_text.to_owned(),
        mention_spans: spans,
        recipients,
        language: lang_code.clone(),
    };
    let mut answer = match coordinator.create_announcement(request).await {
        Ok(created) => {
            metrics::CMD_ANNOUNCE_COUNTER.finished();
            let recipients = created.recipients.iter()
                .filter_map(|uid| names.get(uid).cloned())
                .collect::<Vec<String>>()
                .join(", ");
            t!("commands.announce.created", locale = &lang_code, recipients = recipients).to_string()
        }
        Err(CreateAnnouncementError::Validation(err)) => {
            log::debug!("the announcement of {} was rejected: {err}", from.id);
            t!(err.translation_key(), locale = &lang_code).to_string()
        }
        Err(err) => {
            log::error!("couldn't create an announcement in {}: {err}", msg.chat.id);
            t!("commands.announce.errors.failed", locale = &lang_code).to_string()
        }
    };
    if !unresolved.is_empty() {
        let usernames = unresolved.join(", ");
        answer.push_str("\n\n");
        answer.push_str(&t!("commands.announce.unresolved", locale = &lang_code, usernames = usernames));
    }

    reply_html(bot, &msg, answer).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use teloxide::types::{MessageEntity, User};
    use super::*;

    fn user(id: u64, first_name: &str) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: first_name.to_owned(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn mentions_are_collected_in_order() {
        let text = "/announce@bot @alice Bob read the новые rules";
        let entities = vec![
            MessageEntity::new(MessageEntityKind::BotCommand, 0, 13),
            MessageEntity::new(MessageEntityKind::Mention, 14, 6),
            MessageEntity::new(MessageEntityKind::TextMention { user: user(2, "Bob") }, 21, 3),
            MessageEntity::new(MessageEntityKind::Bold, 34, 5),
        ];
        let entities = MessageEntityRef::parse(text, &entities);
        let collected = collect_mentions(&entities);

        assert_eq!(collected.mentions, vec![
            Mention::Username("@alice".to_owned()),
            Mention::User { uid: UserId(2), name: "Bob".to_owned() },
        ]);
        assert_eq!(collected.spans, vec![0..13, 14..20, 21..24]);
        assert_eq!(crate::domain::strip_mentions(text, &collected.spans), "read the новые rules");
    }
}
