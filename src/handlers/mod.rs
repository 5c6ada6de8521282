mod ack;
mod announce;
mod help;
mod users;
pub mod utils;

use rust_i18n::t;
use teloxide::Bot;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessage};
use teloxide::requests::{JsonRequest, Requester};
use teloxide::types::{CallbackQuery, Message, ReplyParameters};
use teloxide::types::ParseMode::Html;

pub use ack::*;
pub use announce::*;
pub use help::*;
pub use users::*;
use crate::domain::LanguageCode;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub fn reply_html<T: Into<String>>(bot: Bot, msg: &Message, answer: T) -> JsonRequest<SendMessage> {
    let mut answer = bot.send_message(msg.chat.id, answer);
    answer.parse_mode = Some(Html);
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        answer.reply_parameters.replace(ReplyParameters::new(msg.id));
    }
    answer
}

pub async fn send_error_callback_answer(bot: Bot, query: CallbackQuery, tr_key: &str) -> HandlerResult {
    let lang_code = LanguageCode::from_user(&query.from);
    bot.answer_callback_query(query.id)
        .show_alert(true)
        .text(t!(tr_key, locale = &lang_code))
        .await?;
    Ok(())
}

pub mod checks {
    use rust_i18n::t;
    use teloxide::Bot;
    use teloxide::types::Message;
    use crate::domain::LanguageCode;
    use super::{HandlerResult, reply_html};

    pub fn is_group_chat(msg: Message) -> bool {
        if msg.chat.is_private() || msg.chat.is_channel() {
            return false
        }
        true
    }

    pub fn is_not_group_chat(msg: Message) -> bool {
        !is_group_chat(msg)
    }

    pub async fn handle_not_group_chat(bot: Bot, msg: Message) -> HandlerResult {
        let lang_code = LanguageCode::from_maybe_user(msg.from.as_ref());
        let answer = t!("errors.not_group_chat", locale = &lang_code);
        reply_html(bot, &msg, answer).await?;
        Ok(())
    }
}
