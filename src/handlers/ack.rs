use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use rust_i18n::t;
use teloxide::Bot;
use teloxide::payloads::AnswerCallbackQuerySetters;
use teloxide::requests::Requester;
use teloxide::types::CallbackQuery;
use crate::config::AppConfig;
use crate::coordinator::{AcknowledgmentCoordinator, AcknowledgmentEvent, AcknowledgmentOutcome};
use crate::domain::LanguageCode;
use crate::handlers::{send_error_callback_answer, HandlerResult};
use crate::handlers::utils::callbacks::{CallbackDataWithPrefix, InvalidCallbackData, InvalidCallbackDataBuilder};
use crate::metrics;

const READ_PAYLOAD: &str = "read";
const INITIAL_BACKOFF_MS: u64 = 200;

/// Data of the "Read" button under announcements. The message the button is attached to
/// identifies the announcement, so there is nothing else to carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadCallbackData;

impl CallbackDataWithPrefix for ReadCallbackData {
    fn prefix() -> &'static str {
        "ack"
    }
}

impl Display for ReadCallbackData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(READ_PAYLOAD)
    }
}

impl TryFrom<String> for ReadCallbackData {
    type Error = InvalidCallbackData;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == READ_PAYLOAD {
            Ok(Self)
        } else {
            Err(InvalidCallbackDataBuilder(&value).missing_part(READ_PAYLOAD))
        }
    }
}

pub fn ack_callback_filter(query: CallbackQuery) -> bool {
    ReadCallbackData::check_prefix(query)
}

pub async fn ack_callback_handler(bot: Bot, query: CallbackQuery, coordinator: Arc<AcknowledgmentCoordinator>,
                                  config: AppConfig) -> HandlerResult {
    metrics::CALLBACK_READ_COUNTER.invoked();
    if let Err(err) = ReadCallbackData::parse(&query) {
        log::warn!("invalid callback data of the Read button: {err}");
        return send_error_callback_answer(bot, query, "errors.invalid_button").await
    }
    let Some(message) = query.message.as_ref() else {
        log::debug!("the Read button of an inline message was pressed by {}", query.from.id);
        return send_error_callback_answer(bot, query, "acknowledgment.untracked").await
    };

    let event = AcknowledgmentEvent::new(message.chat().id, message.id(), query.from.id, Utc::now());
    let outcome = match acknowledge_with_retries(&coordinator, event, config.ack_retry_attempts).await {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("couldn't handle the acknowledgment of {}:{} by {}: {err:#}", event.chat_id, event.message_id, event.uid);
            return send_error_callback_answer(bot, query, "errors.acknowledgment_failed").await
        }
    };

    let lang_code = LanguageCode::from_user(&query.from);
    let (key, show_alert) = match outcome {
        AcknowledgmentOutcome::Acknowledged { .. } => {
            metrics::CALLBACK_READ_COUNTER.finished();
            ("acknowledgment.thanks", false)
        }
        AcknowledgmentOutcome::AlreadyAcknowledged => ("acknowledgment.already", false),
        AcknowledgmentOutcome::NotARecipient => ("acknowledgment.not_recipient", true),
        AcknowledgmentOutcome::Untracked => ("acknowledgment.untracked", true),
    };
    bot.answer_callback_query(query.id)
        .text(t!(key, locale = &lang_code))
        .show_alert(show_alert)
        .await?;
    Ok(())
}

/// Transient failures of the store are retried with an exponential backoff.
async fn acknowledge_with_retries(coordinator: &AcknowledgmentCoordinator, event: AcknowledgmentEvent,
                                  attempts: u32) -> anyhow::Result<AcknowledgmentOutcome> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match coordinator.on_acknowledgment_event(event).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt < attempts => {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                log::warn!("attempt {attempt}/{attempts} to handle the acknowledgment has failed, retrying in {backoff} ms: {err}");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
