use futures::future::join_all;
use rust_i18n::t;
use teloxide::{Bot, RequestError};
use teloxide::requests::Requester;
use teloxide::types::{BotCommand, BotCommandScope};
use teloxide::utils::command::BotCommands;
use crate::handlers::{AnnounceCommands, HelpCommands};

pub async fn set_my_commands(bot: &Bot, lang_code: &str) -> Result<(), RequestError> {
    let personal_commands = vec![
        HelpCommands::bot_commands(),
    ];
    let group_commands = vec![
        HelpCommands::bot_commands(),
        AnnounceCommands::bot_commands(),
    ];

    let requests = vec![
        set_commands(bot, personal_commands, BotCommandScope::AllPrivateChats, lang_code),
        set_commands(bot, group_commands, BotCommandScope::AllGroupChats, lang_code),
    ];
    join_all(requests)
        .await
        .into_iter()
        .find(Result::is_err)
        .unwrap_or(Ok(()))
}

async fn set_commands(bot: &Bot, commands: Vec<Vec<BotCommand>>, scope: BotCommandScope, lang_code: &str) -> Result<(), RequestError> {
    let commands: Vec<BotCommand> = commands
        .concat()
        .into_iter()
        .filter(|cmd| !cmd.description.is_empty())
        .map(|mut cmd| {
            let key = format!("commands.{}.description", cmd.description);
            cmd.description = t!(&key, locale = lang_code).to_string();
            cmd
        })
        .collect();
    let mut request = bot.set_my_commands(commands);
    request.language_code.replace(lang_code.to_owned());
    request.scope.replace(scope);
    request.await?;
    Ok(())
}
