use teloxide::types::Message;
use crate::handlers::HandlerResult;
use crate::repo;

/// Remembers the sender of every group message, so they can be mentioned by `@username` later.
pub async fn remember_sender_handler(msg: Message, users: repo::Users) -> HandlerResult {
    match msg.from.as_ref().filter(|user| !user.is_bot) {
        Some(user) => users.create_or_update(user.id, user.username.as_deref(), &user.full_name()).await?,
        None => log::debug!("no human sender of the message {} in {}", msg.id, msg.chat.id),
    }
    Ok(())
}
