use async_trait::async_trait;
use derive_more::Constructor;
use rust_i18n::t;
use teloxide::Bot;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ReplyParameters, UserId};
use teloxide::types::ParseMode::Html;
use crate::handlers::utils::callbacks::CallbackDataWithPrefix;
use crate::handlers::ReadCallbackData;

/// Outbound side of the bot. All texts are expected to be valid HTML already.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Posts the announcement with the "Read" button under it.
    async fn post_announcement(&self, chat_id: ChatId, text: &str, language: &str) -> anyhow::Result<MessageId>;
    async fn retract(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()>;
    async fn post_in_thread(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> anyhow::Result<()>;
    async fn send_direct(&self, uid: UserId, text: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Constructor)]
pub struct TelegramMessenger {
    bot: Bot,
}

pub fn read_button_keyboard(language: &str) -> InlineKeyboardMarkup {
    let title = t!("announcement.button", locale = language);
    let button = InlineKeyboardButton::callback(title, ReadCallbackData.to_data_string());
    InlineKeyboardMarkup::new(vec![vec![button]])
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn post_announcement(&self, chat_id: ChatId, text: &str, language: &str) -> anyhow::Result<MessageId> {
        let mut request = self.bot.send_message(chat_id, text);
        request.parse_mode.replace(Html);
        request.reply_markup.replace(read_button_keyboard(language).into());
        let message = request.await?;
        Ok(message.id)
    }

    async fn retract(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn post_in_thread(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> anyhow::Result<()> {
        let mut request = self.bot.send_message(chat_id, text);
        request.parse_mode.replace(Html);
        request.reply_parameters.replace(ReplyParameters::new(reply_to));
        request.await?;
        Ok(())
    }

    async fn send_direct(&self, uid: UserId, text: &str) -> anyhow::Result<()> {
        let mut request = self.bot.send_message(ChatId::from(uid), text);
        request.parse_mode.replace(Html);
        request.await?;
        Ok(())
    }
}
