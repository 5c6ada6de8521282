use teloxide::Bot;
use teloxide::macros::BotCommands;
use teloxide::types::Message;
use crate::domain::LanguageCode;
use crate::handlers::{reply_html, HandlerResult};
use crate::help::HelpContainer;
use crate::metrics;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum HelpCommands {
    Start,
    #[command(description = "help")]
    Help,
}

pub async fn help_cmd_handler(bot: Bot, msg: Message, cmd: HelpCommands, help: HelpContainer) -> HandlerResult {
    let lang_code = LanguageCode::from_maybe_user(msg.from.as_ref());
    let answer = match cmd {
        HelpCommands::Start if msg.from.is_some() => {
            metrics::CMD_START_COUNTER.inc();
            let name = msg.from.as_ref()
                .map(|user| user.first_name.as_str())
                .unwrap_or_default();
            help.get_start_message(name, &lang_code)
        }
        HelpCommands::Start => {
            log::warn!("The /start command was invoked without a FROM field for message: {:?}", msg);
            help.get_help_message(&lang_code)
        }
        HelpCommands::Help => {
            metrics::CMD_HELP_COUNTER.inc();
            help.get_help_message(&lang_code)
        }
    };
    reply_html(bot, &msg, answer).await?;
    Ok(())
}
